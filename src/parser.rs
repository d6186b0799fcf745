use crate::errors::IngestError;
use crate::models::{LoanRecord, Student};
use crate::sheet::RawSheet;
use regex::Regex;
use std::sync::LazyLock;

pub const UNKNOWN_NAME: &str = "이름 미상";
pub const UNKNOWN_CLASS: &str = "학번 미상";

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"성명\s*:\s*(.+)").expect("name pattern"));

static CLASS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"학년\s*-\s*반\s*-\s*번호\s*:\s*([0-9]+)-([0-9]+)-([0-9]+)").expect("class pattern")
});

/// Fixed positions of the loan-history export.
#[derive(Debug, Clone, Copy)]
pub struct LoanSheetLayout {
    pub identity_row: usize,
    pub identity_col: usize,
    pub data_start_row: usize,
    pub registration_col: usize,
    pub title_col: usize,
    pub call_number_col: usize,
    pub loan_date_col: usize,
}

impl Default for LoanSheetLayout {
    fn default() -> Self {
        Self {
            identity_row: 3,
            identity_col: 0,
            data_start_row: 5,
            registration_col: 1,
            title_col: 2,
            call_number_col: 6,
            loan_date_col: 8,
        }
    }
}

pub struct LoanHistory {
    pub student: Student,
    pub loans: Vec<LoanRecord>,
}

#[derive(Default)]
pub struct LoanHistoryParser {
    layout: LoanSheetLayout,
}

impl LoanHistoryParser {
    pub fn new() -> Self {
        Self::with_layout(LoanSheetLayout::default())
    }

    pub fn with_layout(layout: LoanSheetLayout) -> Self {
        Self { layout }
    }

    pub fn parse(&self, sheet: &RawSheet) -> Result<LoanHistory, IngestError> {
        let student = self.parse_student(sheet)?;
        let loans = self.parse_loans(sheet);
        log::info!(
            "parsed loan history for {} ({}): {} loan rows",
            student.name,
            student.class_info,
            loans.len()
        );
        Ok(LoanHistory { student, loans })
    }

    fn parse_student(&self, sheet: &RawSheet) -> Result<Student, IngestError> {
        let layout = &self.layout;
        if sheet.row_count() <= layout.identity_row {
            return Err(IngestError::Parse {
                reason: format!(
                    "expected at least {} rows, found {}",
                    layout.identity_row + 1,
                    sheet.row_count()
                ),
            });
        }

        let identity_cell = sheet.cell(layout.identity_row, layout.identity_col);
        if identity_cell.is_blank() {
            return Err(IngestError::Parse {
                reason: format!(
                    "student identity cell (row {}, column {}) is empty",
                    layout.identity_row + 1,
                    layout.identity_col + 1
                ),
            });
        }

        Ok(parse_identity(&identity_cell.as_text()))
    }

    fn parse_loans(&self, sheet: &RawSheet) -> Vec<LoanRecord> {
        let layout = &self.layout;
        let mut loans = Vec::new();

        for row in layout.data_start_row..sheet.row_count() {
            let registration_cell = sheet.cell(row, layout.registration_col);
            if registration_cell.is_blank() {
                continue;
            }

            let call_number = sheet.cell(row, layout.call_number_col).as_text();
            loans.push(LoanRecord {
                registration_number: registration_cell.as_text(),
                title: sheet.cell(row, layout.title_col).as_text(),
                call_number: (!call_number.is_empty()).then_some(call_number),
                loan_date: sheet.cell(row, layout.loan_date_col).as_date(),
            });
        }

        loans
    }
}

/// Pulls name and grade-class-number out of the identity text block.
/// Each pattern is independent; a miss falls back to a sentinel.
pub fn parse_identity(text: &str) -> Student {
    let name = NAME_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNKNOWN_NAME.to_string());

    let (grade, class_info) = match CLASS_PATTERN.captures(text) {
        Some(caps) => {
            let grade = caps[1].parse::<u32>().ok().filter(|g| *g > 0);
            let info = format!("{}학년 {}반 {}번", &caps[1], &caps[2], &caps[3]);
            (grade, info)
        }
        None => (None, UNKNOWN_CLASS.to_string()),
    };

    Student {
        name,
        grade,
        class_info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::Cell;
    use chrono::NaiveDate;

    fn data_row(reg: Cell, title: &str, call: Cell, date: Cell) -> Vec<Cell> {
        vec![
            Cell::Number(1.0),
            reg,
            Cell::text(title),
            Cell::Empty,
            Cell::Empty,
            Cell::Empty,
            call,
            Cell::Empty,
            date,
        ]
    }

    fn sample_sheet() -> RawSheet {
        RawSheet::from_rows(vec![
            vec![Cell::text("개인별 대출 내역")],
            vec![],
            vec![],
            vec![Cell::text("성명: 홍길동\n학년-반-번호: 2-3-15")],
            vec![Cell::text("순번"), Cell::text("등록번호"), Cell::text("서명")],
            data_row(Cell::text(" EM0001 "), "소년이 온다", Cell::text("813.6-한131소"), Cell::text("2024-03-15")),
            data_row(Cell::Empty, "빈 행", Cell::Empty, Cell::Empty),
            data_row(Cell::text("   "), "공백 등록번호", Cell::Empty, Cell::Empty),
            data_row(Cell::Number(12345.0), "코스모스", Cell::text(" "), Cell::text("언젠가")),
            data_row(Cell::text("EM0003"), "이기적 유전자", Cell::text("472"), Cell::DateTime(45366.0)),
        ])
    }

    #[test]
    fn identity_block_yields_name_grade_and_class() {
        let student = parse_identity("성명: 홍길동\n학년-반-번호: 2-3-15");
        assert_eq!(student.name, "홍길동");
        assert_eq!(student.grade, Some(2));
        assert_eq!(student.class_info, "2학년 3반 15번");
    }

    #[test]
    fn identity_tolerates_spacing_around_labels() {
        let student = parse_identity("성명 :  김철수  \n학년 - 반 - 번호 : 1-10-7");
        assert_eq!(student.name, "김철수");
        assert_eq!(student.grade, Some(1));
        assert_eq!(student.class_info, "1학년 10반 7번");
    }

    #[test]
    fn zero_grade_counts_as_absent() {
        let student = parse_identity("성명: 홍길동\n학년-반-번호: 0-3-15");
        assert_eq!(student.grade, None);
        assert_eq!(student.class_info, "0학년 3반 15번");
    }

    #[test]
    fn unmatched_patterns_fall_back_to_sentinels() {
        let student = parse_identity("대출자 정보 없음");
        assert_eq!(student.name, UNKNOWN_NAME);
        assert_eq!(student.grade, None);
        assert_eq!(student.class_info, UNKNOWN_CLASS);

        let only_name = parse_identity("성명: 이영희");
        assert_eq!(only_name.name, "이영희");
        assert_eq!(only_name.grade, None);
    }

    #[test]
    fn data_rows_skip_blank_registration_numbers() {
        let history = LoanHistoryParser::new().parse(&sample_sheet()).unwrap();
        let regs: Vec<_> = history.loans.iter().map(|l| l.registration_number.as_str()).collect();
        assert_eq!(regs, vec!["EM0001", "12345", "EM0003"]);
        assert_eq!(history.student.name, "홍길동");
    }

    #[test]
    fn data_row_fields_degrade_to_none() {
        let history = LoanHistoryParser::new().parse(&sample_sheet()).unwrap();
        let first = &history.loans[0];
        assert_eq!(first.title, "소년이 온다");
        assert_eq!(first.call_number.as_deref(), Some("813.6-한131소"));
        assert_eq!(first.loan_date, NaiveDate::from_ymd_opt(2024, 3, 15));

        let second = &history.loans[1];
        assert_eq!(second.call_number, None);
        assert_eq!(second.loan_date, None);

        assert_eq!(history.loans[2].loan_date, NaiveDate::from_ymd_opt(2024, 3, 15));
    }

    #[test]
    fn short_sheet_is_a_parse_error() {
        let sheet = RawSheet::from_rows(vec![vec![Cell::text("제목")], vec![], vec![]]);
        let err = LoanHistoryParser::new().parse(&sheet).err().unwrap();
        assert!(matches!(err, IngestError::Parse { .. }));
    }

    #[test]
    fn empty_identity_cell_is_a_parse_error() {
        let sheet = RawSheet::from_rows(vec![vec![], vec![], vec![], vec![Cell::Empty]]);
        let err = LoanHistoryParser::new().parse(&sheet).err().unwrap();
        assert!(matches!(err, IngestError::Parse { .. }));
    }

    #[test]
    fn sheet_without_data_rows_has_no_loans() {
        let sheet = RawSheet::from_rows(vec![
            vec![],
            vec![],
            vec![],
            vec![Cell::text("성명: 홍길동")],
        ]);
        let history = LoanHistoryParser::new().parse(&sheet).unwrap();
        assert!(history.loans.is_empty());
    }
}
