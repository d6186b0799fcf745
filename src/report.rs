use crate::classifier::CategoryStats;
use crate::models::{CategoryCount, MergedRecord, Student};
use crate::percentile::PercentileOutcome;
use crate::thumbnail::{IsbnFailure, ResolvedBatch, PLACEHOLDER_THUMBNAIL};
use anyhow::Result;
use serde::Serialize;
use std::fs;
use std::path::Path;

const UNKNOWN_PERCENTILE: &str = "?";

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub student: Student,
    pub grade: Option<u32>,
    /// Loan rows parsed from the history, before the join. This is the count
    /// ranked by the percentile and shown on the print view.
    pub total_loans: usize,
    pub resolved_count: usize,
    pub percentile: Option<PercentileOutcome>,
    pub percentile_text: String,
    pub most_read_category: String,
    pub category_counts: Vec<CategoryCount>,
    pub records: Vec<MergedRecord>,
    pub lookup_failures: Vec<IsbnFailure>,
}

pub fn assemble(
    student: Student,
    total_loans: usize,
    percentile: Option<PercentileOutcome>,
    categories: CategoryStats,
    batch: ResolvedBatch,
) -> Report {
    let percentile_text = percentile
        .as_ref()
        .map(PercentileOutcome::short_text)
        .unwrap_or_else(|| UNKNOWN_PERCENTILE.to_string());

    Report {
        grade: student.grade,
        student,
        total_loans,
        resolved_count: batch.resolved_count,
        percentile,
        percentile_text,
        most_read_category: categories.most_read,
        category_counts: categories.counts,
        records: batch.records,
        lookup_failures: batch.failures,
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

const PRINT_STYLE: &str = r#"
        body, h1, p, div { font-family: 'Gowun Dodum', sans-serif; margin: 0; padding: 0; }
        @media print {
            body { background-color: white; }
            .book-item { page-break-inside: avoid; }
            @page { size: A4; margin: 0; }
            .print-button { display: none; }
        }
        .book-item { text-align: center; border-radius: 8px; padding: 6px; }
        .book-item img { width: 70px; height: auto; max-height: 100px; object-fit: contain; }
        .book-item p {
            overflow: hidden; display: -webkit-box; -webkit-line-clamp: 4; -webkit-box-orient: vertical;
            text-overflow: ellipsis; line-height: 1.4em; max-height: 6em; font-size: 0.8em; margin-top: 4px;
        }
        .print-button {
            background-color: #4CAF50; color: white; padding: 10px 15px; border: none;
            border-radius: 4px; cursor: pointer; font-size: 16px; margin: 20px 0; display: block;
        }
        .book-grid { display: grid; grid-template-columns: repeat(5, 1fr); gap: 10px; margin: 0 auto; max-width: 100%; }
        .container { max-width: 21cm; margin: 0 auto; padding: 20px; box-sizing: border-box; position: relative; }
        .page {
            background-color: white; width: 21cm; min-height: 29.7cm; margin: 10px auto; padding: 2cm;
            position: relative; box-sizing: border-box; box-shadow: 0 0 10px rgba(0,0,0,0.1);
        }
        .page-border {
            position: absolute; top: 1cm; left: 1cm; right: 1cm; bottom: 1cm;
            border: 2px solid black; pointer-events: none; z-index: 1;
        }
        .page-content { position: relative; z-index: 2; padding: 1cm; }
        .student-info { text-align: center; font-size: 18px; margin-bottom: 20px; }
        .header { text-align: center; font-size: 30px; margin-bottom: 30px; }
        .header h1 { margin-top: 0; font-size: 28px; }
"#;

/// Printable A4 page: summary lines followed by a 5-column grid of covers.
pub fn render_print_view(report: &Report, school_name: &str) -> String {
    let name = escape_html(&report.student.name);
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"ko\">\n<head>\n");
    html.push_str("    <meta charset=\"UTF-8\">\n");
    html.push_str("    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    html.push_str("    <title>독서 기록 리스트</title>\n");
    html.push_str("    <link href=\"https://fonts.googleapis.com/css2?family=Gowun+Dodum&display=swap\" rel=\"stylesheet\">\n");
    html.push_str(&format!("    <style>{}    </style>\n", PRINT_STYLE));
    html.push_str("</head>\n<body>\n<div class=\"container\">\n");
    html.push_str("    <button class=\"print-button\" onclick=\"setTimeout(function () { window.print(); }, 500)\">인쇄하기</button>\n");
    html.push_str("    <div class=\"page\">\n        <div class=\"page-border\"></div>\n        <div class=\"page-content\">\n");
    html.push_str(&format!(
        "            <div class=\"header\"><h1>{}의 독서 기록</h1></div>\n",
        name
    ));
    html.push_str(&format!(
        "            <div class=\"student-info\">\n\
                <p>{name} 학생은 {school}에서 {count}권의 책을 읽었습니다 📚</p>\n\
                <p>{name} 학생의 독서 기록은 상위 {percentile}입니다 🏅</p>\n\
                <p>{name} 학생이 <strong>가장 많이 읽은 분야는 {category}입니다 📖</strong></p>\n\
            </div>\n",
        name = name,
        school = escape_html(school_name),
        count = report.total_loans,
        percentile = escape_html(&report.percentile_text),
        category = escape_html(&report.most_read_category),
    ));

    html.push_str("            <div class=\"book-grid\">\n");
    for record in &report.records {
        let thumbnail = record.thumbnail_url.as_deref().unwrap_or(PLACEHOLDER_THUMBNAIL);
        let title = if record.title.is_empty() {
            "제목 없음".to_string()
        } else {
            escape_html(&record.title)
        };
        let date = record
            .formatted_loan_date()
            .map(|d| format!("{}.", d))
            .unwrap_or_else(|| "정보 없음".to_string());

        html.push_str(&format!(
            "                <div class=\"book-item\">\n\
                    <img src=\"{src}\" alt=\"{title}\">\n\
                    <p>{title}<br>{date}</p>\n\
                </div>\n",
            src = escape_html(thumbnail),
            title = title,
            date = date,
        ));
    }
    html.push_str("            </div>\n        </div>\n    </div>\n</div>\n</body>\n</html>\n");
    html
}

pub fn write_records_csv(records: &[MergedRecord], output_dir: &str) -> Result<()> {
    use csv::Writer;

    let csv_path = Path::new(output_dir).join("merged_records.csv");
    let mut writer = Writer::from_path(csv_path)?;

    writer.write_record([
        "Registration Number",
        "Title",
        "Call Number",
        "Loan Date",
        "ISBN",
        "Thumbnail URL",
    ])?;

    for record in records {
        writer.write_record([
            record.registration_number.as_str(),
            record.title.as_str(),
            record.call_number.as_deref().unwrap_or(""),
            record.formatted_loan_date().as_deref().unwrap_or(""),
            record.isbn.as_deref().unwrap_or(""),
            record.thumbnail_url.as_deref().unwrap_or(""),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_report_json(report: &Report, output_dir: &str) -> Result<()> {
    let content = serde_json::to_string_pretty(report)?;
    fs::write(Path::new(output_dir).join("report.json"), content)?;
    Ok(())
}

pub fn write_print_view(report: &Report, school_name: &str, output_dir: &str) -> Result<()> {
    fs::write(
        Path::new(output_dir).join("print_view.html"),
        render_print_view(report, school_name),
    )?;
    Ok(())
}
