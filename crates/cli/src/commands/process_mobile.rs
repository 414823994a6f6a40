//! `vitalchat process-mobile`: HealthKit export to processed metrics.

use std::path::Path;

use tracing::info;

pub async fn run(input: &Path, output: &Path, offset_days: i64) -> Result<(), Box<dyn std::error::Error>> {
    if !input.is_dir() {
        return Err(format!("Input directory not found: {}", input.display()).into());
    }

    info!(input = %input.display(), offset_days, "Processing HealthKit export");
    let input_dir = input.to_path_buf();
    let data = tokio::task::spawn_blocking(move || {
        vitalchat_health::process_directory(&input_dir, offset_days)
    })
    .await??;
    data.save(output)?;

    println!("Processed mobile data written to {}", output.display());
    match &data.date_range {
        Some(range) => println!("  Date range: {} to {} ({} days)", range.start, range.end, data.total_days),
        None => println!("  No dated samples found"),
    }
    println!("  Heart rate days:   {}", data.heart_rate.daily.len());
    println!("  HRV days:          {}", data.hrv.daily.len());
    println!("  Step days:         {}", data.steps.daily.len());
    println!("  BP readings:       {}", data.blood_pressure.readings.len());
    Ok(())
}
