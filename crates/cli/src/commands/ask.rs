//! `vitalchat ask`: answer one question.

use super::{Runtime, watch_progress};

pub async fn run(question: &str, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load().await?;

    let progress = watch_progress(runtime.orchestrator.status());
    let outcome = runtime.orchestrator.synthesize(question, &[]).await;
    match &outcome {
        Ok(_) => {
            let _ = progress.await;
        }
        Err(_) => progress.abort(),
    }
    let result = outcome?;

    if dry_run {
        for message in &result.messages {
            println!("[{}]", message.role.as_str());
            println!("{}\n", message.content);
        }
        return Ok(());
    }

    eprint!("  Thinking...");
    let answer = runtime.answer(&result).await;
    eprint!("\r\x1b[2K");
    println!("{}", answer?);

    if !result.citations.is_empty() {
        println!();
        println!("Sources:");
        for (i, url) in result.citations.iter().enumerate() {
            println!("  {}. {url}", i + 1);
        }
    }

    Ok(())
}
