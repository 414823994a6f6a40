//! `vitalchat chat`: interactive conversation.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};
use vitalchat_core::message::{Conversation, Message};

use super::{Runtime, watch_progress};

const SYSTEM_PROMPT: &str = "You are VitalChat, a personal health assistant. \
Answer clearly and concisely. When personal health data is provided, ground your answer in it. \
You are not a doctor; recommend professional care for diagnosis or treatment decisions.";

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load().await?;

    println!();
    println!("  VitalChat, interactive mode");
    println!();
    println!("  Model:   {}", runtime.config.default_model);
    println!("  Search:  {}", if runtime.config.search.enabled { "enabled" } else { "disabled" });
    println!(
        "  Records: {}",
        runtime
            .config
            .health
            .records_path
            .as_ref()
            .map_or("none".to_string(), |p| p.display().to_string())
    );
    println!(
        "  Mobile:  {}",
        runtime
            .config
            .health
            .mobile_path
            .as_ref()
            .map_or("none".to_string(), |p| p.display().to_string())
    );
    println!();
    println!("  Type your question and press Enter. Type 'exit' to quit.");
    println!();

    let mut conversation = Conversation::with_system_prompt(SYSTEM_PROMPT);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }

        let progress = watch_progress(runtime.orchestrator.status());
        let result = match runtime.orchestrator.synthesize(question, &conversation.messages).await {
            Ok(result) => {
                let _ = progress.await;
                result
            }
            Err(e) => {
                progress.abort();
                eprintln!("  [Error] {e}");
                continue;
            }
        };

        match runtime.answer(&result).await {
            Ok(answer) => {
                println!();
                for line in answer.lines() {
                    println!("  VitalChat > {line}");
                }
                println!();
                conversation.push(Message::user(question));
                conversation.push(Message::assistant(answer));
            }
            Err(e) => eprintln!("  [Error] {e}\n"),
        }
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}
