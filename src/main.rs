mod classifier;
mod errors;
mod kakao;
mod mapping;
mod models;
mod parser;
mod percentile;
mod pipeline;
mod report;
mod sheet;
mod thumbnail;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use kakao::KakaoBookSearch;
use models::Config;
use pipeline::{run_batch, BatchOptions};
use report::Report;
use std::fs;
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = Command::new("reading-report")
        .version("0.1")
        .about("Builds a printable reading record from library loan exports")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("loans")
                .short('l')
                .long("loans")
                .value_name("FILE")
                .help("Loan history workbook (overrides loan_history_path)"),
        )
        .arg(
            Arg::new("mapping")
                .short('m')
                .long("mapping")
                .value_name("FILE")
                .help("Registration number to ISBN workbook (overrides mapping_path)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Output directory (overrides output_directory)"),
        )
        .get_matches();

    let config_file = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("config.toml");

    let mut config = if Path::new(config_file).exists() {
        println!("📋 Loading configuration from: {}", config_file);
        Config::load_from_file(config_file)
            .with_context(|| format!("Failed to load configuration: {}", config_file))?
    } else {
        println!("📝 Creating default configuration file: {}", config_file);
        Config::default().save_to_file(config_file)?;
        println!("⚠️  Please edit {} and set your Kakao API key, then run the program again.", config_file);
        return Ok(());
    };

    if let Some(path) = matches.get_one::<String>("loans") {
        config.loan_history_path = path.clone();
    }
    if let Some(path) = matches.get_one::<String>("mapping") {
        config.mapping_path = path.clone();
    }
    if let Some(dir) = matches.get_one::<String>("output") {
        config.output_directory = Some(dir.clone());
    }
    if config.kakao.api_key.is_empty() {
        if let Ok(key) = std::env::var("KAKAO_API_KEY") {
            config.kakao.api_key = key;
        }
    }

    if config.kakao.api_key.is_empty() {
        println!("❌ Error: Kakao API key is not configured");
        println!("   Set [kakao] api_key in {} or the KAKAO_API_KEY environment variable", config_file);
        return Ok(());
    }

    let output_dir = config.output_directory.as_deref().unwrap_or("output");
    fs::create_dir_all(output_dir)?;

    println!("📂 Loan history: {}", config.loan_history_path);
    println!("📂 ISBN mapping: {}", config.mapping_path);
    println!("📄 Output directory: {}", output_dir);

    let loan_sheet = sheet::read_first_sheet(&config.loan_history_path)?;
    let mapping_sheet = sheet::read_first_sheet(&config.mapping_path)?;

    let lookup = KakaoBookSearch::new(&config.kakao);
    let options = BatchOptions {
        max_concurrent_lookups: config.max_concurrent_lookups,
    };

    let report = match run_batch(&loan_sheet, &mapping_sheet, &lookup, &options).await {
        Ok(report) => report,
        Err(e @ errors::IngestError::Parse { .. }) => {
            println!("❌ {}", e);
            println!("   Check that {} is the per-student loan history export", config.loan_history_path);
            return Err(e.into());
        }
        Err(e @ errors::IngestError::Schema { .. }) => {
            println!("❌ {}", e);
            println!("   {} needs a header row with '등록번호' and 'ISBN' columns", config.mapping_path);
            return Err(e.into());
        }
    };

    report::write_print_view(&report, &config.report.school_name, output_dir)?;
    report::write_records_csv(&report.records, output_dir)?;
    report::write_report_json(&report, output_dir)?;

    print_summary(&report);
    println!("\n✅ Reports written to {}", output_dir);
    Ok(())
}

fn print_summary(report: &Report) {
    println!("\n📊 SUMMARY");
    println!("==========\n");

    println!("👤 Student: {} ({})", report.student.name, report.student.class_info);
    if let Some(grade) = report.grade {
        println!("🎓 Detected grade: {}", grade);
    }

    println!("📚 Loans: {}", report.total_loans);
    println!("🎉 Records with cover images: {}", report.resolved_count);

    match &report.percentile {
        Some(outcome) => println!("🏅 {}", outcome),
        None => println!("🏅 Standing unavailable (grade unknown)"),
    }

    println!("📖 Most read category: {}", report.most_read_category);
    for (i, category) in report.category_counts.iter().enumerate() {
        println!("   {}. {} - {}", i + 1, category.label, category.count);
    }

    if !report.lookup_failures.is_empty() {
        println!("\n⚠️  Cover lookups that failed:");
        for failure in &report.lookup_failures {
            println!(
                "   - {}: {}",
                failure.isbn.as_deref().unwrap_or("(none)"),
                failure.reason
            );
        }
    }
}
