use crate::types::Category;

/// Appended when [`truncate`] has to cut text.
pub const ELLIPSIS: &str = "...";
/// Longest excerpt of the triggering text quoted in the problem section.
pub const EXCERPT_LEN: usize = 160;

// ---------------------------------------------------------------------------
// Truncation
// ---------------------------------------------------------------------------

/// Cap `text` at `max_len` characters.
///
/// Longer text is cut and ends with [`ELLIPSIS`]; the result is then exactly
/// `max_len` characters. Cuts happen on char boundaries only, never inside a
/// code point. Structure (sections, sentences) is not respected.
pub fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let marker_len = ELLIPSIS.chars().count();
    if max_len <= marker_len {
        return text.chars().take(max_len).collect();
    }
    let mut out: String = text.chars().take(max_len - marker_len).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Collapse whitespace runs to single spaces and trim.
fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

pub struct Template {
    pub mechanism: &'static str,
    pub onchain: &'static str,
    pub incentives: &'static str,
    pub attacks: &'static str,
    pub tradeoffs: &'static str,
}

pub fn template_for(category: Category) -> Option<&'static Template> {
    match category {
        Category::Oracle => Some(&ORACLE),
        Category::Identity => Some(&IDENTITY),
        Category::Governance => Some(&GOVERNANCE),
        Category::Markets => Some(&MARKETS),
        Category::Interoperability => Some(&INTEROPERABILITY),
        Category::Privacy => Some(&PRIVACY),
        Category::Unknown => None,
    }
}

static ORACLE: Template = Template {
    mechanism: "A staked reporter set submits signed observations each round; the \
        published value is the stake-weighted median, and rounds close on a fixed \
        heartbeat or when the value drifts past a deviation threshold.",
    onchain: "An aggregator contract stores the latest round, the reporter set and \
        per-reporter stake. Consumers read a (value, round, timestamp) tuple and \
        reject rounds older than their own staleness bound.",
    incentives: "Reporters earn a per-round fee split pro rata to stake. Reports \
        outside a tolerance band of the median are slashed after a dispute window.",
    attacks: "Collusion among a stake majority: cap any single reporter's weight \
        and rotate the set. Flash-loan price manipulation at the source: sample \
        TWAPs across venues. Liveness stalls: consumers fall back to the last \
        good round and pause on staleness.",
    tradeoffs: "Tighter deviation thresholds raise freshness and gas cost together; \
        a larger reporter set resists collusion but slows rounds.",
};

static IDENTITY: Template = Template {
    mechanism: "Participants collect attestations from independent issuers; an \
        identity score is the weighted sum of unexpired attestations, and \
        applications gate actions on a minimum score.",
    onchain: "A registry maps subject to attestation hashes, issuer and expiry. \
        Raw credentials stay off-chain; only commitments and revocation bits \
        are stored.",
    incentives: "Issuers bond stake per attestation and lose it if the subject is \
        later proven a duplicate. Subjects pay a small fee to deter spam.",
    attacks: "Sybil farms buying attestations: weight issuers by their own track \
        record and bound the weight any single issuer can grant. Issuer key \
        compromise: time-limited attestations and fast revocation.",
    tradeoffs: "Stronger uniqueness guarantees need more invasive evidence; \
        lighter checks keep privacy but admit more duplicates.",
};

static GOVERNANCE: Template = Template {
    mechanism: "Proposals pass through a discussion window, a snapshot of voting \
        power, a voting window and a timelock before execution. Passing needs \
        both quorum and a supermajority of votes cast.",
    onchain: "A governor contract records proposals, vote tallies and the \
        execution queue. Voting power is read from checkpoints at the snapshot \
        block so it cannot be borrowed mid-vote.",
    incentives: "Delegates who vote consistently earn a share of protocol fees; \
        proposers post a bond returned once quorum is reached.",
    attacks: "Vote buying and flash-loaned power: snapshot-based balances and \
        a timelock. Low-turnout capture: adaptive quorum. Malicious payloads: \
        a guardian veto limited to the timelock window.",
    tradeoffs: "Longer timelocks protect minorities but slow emergency response; \
        higher quorum blocks capture but risks paralysis.",
};

static MARKETS: Template = Template {
    mechanism: "Orders settle through a batch auction at a single clearing price \
        per interval, with unmatched liquidity rolling into the next batch.",
    onchain: "A settlement contract holds escrowed balances, verifies the \
        clearing solution submitted by a solver and pays out atomically.",
    incentives: "Solvers compete on surplus returned to traders and earn a fee \
        from the surplus they generate. Makers receive a rebate for resting \
        liquidity.",
    attacks: "Front-running and sandwiching: uniform clearing prices remove \
        intra-batch ordering value. Solver collusion: permissionless solver \
        entry and surplus-based selection.",
    tradeoffs: "Batching removes ordering games at the cost of latency; longer \
        batches deepen liquidity but delay fills.",
};

static INTEROPERABILITY: Template = Template {
    mechanism: "Messages are committed on the source chain, relayed with a proof \
        of inclusion, and executed on the destination after a challenge window.",
    onchain: "Light-client contracts track the counterpart chain's headers; an \
        inbox contract verifies inclusion proofs and enforces ordered, \
        exactly-once delivery by nonce.",
    incentives: "Relayers are paid per delivered message by the sender. Watchers \
        who prove a fraudulent header claim the relayer's bond.",
    attacks: "Forged headers: fraud proofs within the challenge window. Replay \
        across chains: domain-separated message hashes and nonces. Liveness \
        failure of relayers: anyone may relay with a valid proof.",
    tradeoffs: "Shorter challenge windows speed transfers but shrink the time to \
        catch fraud; light clients cost more gas than trusted committees.",
};

static PRIVACY: Template = Template {
    mechanism: "Users deposit into a shielded pool and spend notes with \
        zero-knowledge proofs that show ownership and balance conservation \
        without revealing sender, receiver or amount.",
    onchain: "A verifier contract checks proofs against a Merkle root of note \
        commitments and records spent nullifiers to stop double spends.",
    incentives: "Relayers submit transactions on behalf of users for a fee taken \
        from the shielded amount, so users never link a funded address.",
    attacks: "Small anonymity sets: fixed denominations and deposit delays. \
        Timing correlation: randomized relay delays. Illicit flows: optional \
        viewing keys for selective disclosure.",
    tradeoffs: "Stronger privacy grows proof cost and limits composability; \
        compliance hooks narrow the anonymity set.",
};

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render the multi-section proposal for `text`.
///
/// Unclassified text yields `None`: we would rather skip a round than post
/// generic filler. The result never exceeds `max_len` characters.
pub fn build_content(text: &str, category: Category, max_len: usize) -> Option<String> {
    let t = template_for(category)?;
    let problem = truncate(&squash(text), EXCERPT_LEN);
    let body = format!(
        "Problem: {problem}\n\n\
         Mechanism: {}\n\n\
         On-chain design: {}\n\n\
         Incentives: {}\n\n\
         Attack vectors and mitigations: {}\n\n\
         Tradeoffs: {}",
        t.mechanism, t.onchain, t.incentives, t.attacks, t.tradeoffs
    );
    Some(truncate(&body, max_len))
}

/// Short critique of another idea, drawn from the category's attack section.
pub fn build_comment(category: Category, target: &str, max_len: usize) -> Option<String> {
    let t = template_for(category)?;
    let target = truncate(&squash(target), 80);
    let body = format!(
        "On \"{target}\": the {category} design should address its failure modes. {} \
         Worth stating which tradeoff you accept: {}",
        t.attacks, t.tradeoffs
    );
    Some(truncate(&body, max_len))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
