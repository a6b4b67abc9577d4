use crate::output::print_json;
use conclave_core::classifier::classify;
use conclave_core::template::build_content;
use conclave_core::ticker::derive_ticker;

pub fn run(text: &str, seed: &str, json: bool) -> anyhow::Result<()> {
    let category = classify(text);
    let ticker = derive_ticker(text, seed);

    if json {
        let value = serde_json::json!({
            "category": category,
            "ticker": ticker,
        });
        print_json(&value)?;
    } else {
        println!("Category: {category}");
        println!("Ticker:   {ticker}");
    }
    Ok(())
}

/// Render the proposal a tick would submit for `text`.
pub fn draft(text: &str, seed: &str, max_len: usize, json: bool) -> anyhow::Result<()> {
    let category = classify(text);
    let ticker = derive_ticker(text, seed);
    let content = build_content(text, category, max_len);

    if json {
        let value = serde_json::json!({
            "category": category,
            "ticker": ticker,
            "content": content,
        });
        return print_json(&value);
    }
    match content {
        Some(body) => {
            println!("[{ticker}] {category}\n");
            println!("{body}");
        }
        None => println!("Topic not recognized; nothing would be proposed."),
    }
    Ok(())
}
