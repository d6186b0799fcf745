//! Mid-rank standing of a loan count against fixed per-grade reference data.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use std::sync::LazyLock;

/// Reference population the distributions below are normalised to.
pub const REFERENCE_POPULATION: u32 = 300;

/// Per grade: loan count → number of students with that count.
pub struct ReferenceDistribution {
    grades: BTreeMap<u32, BTreeMap<u32, u32>>,
    population: u32,
}

static DEFAULT_DISTRIBUTION: LazyLock<ReferenceDistribution> = LazyLock::new(|| {
    ReferenceDistribution::new(
        REFERENCE_POPULATION,
        [
            (1, vec![(5, 1), (3, 1), (2, 4), (1, 10), (0, 284)]),
            (
                2,
                vec![
                    (104, 1), (43, 1), (40, 1), (20, 1), (18, 1), (16, 2), (15, 1),
                    (12, 3), (11, 3), (10, 6), (9, 8), (8, 6), (7, 7), (6, 15),
                    (5, 18), (4, 20), (3, 32), (2, 47), (1, 66), (0, 61),
                ],
            ),
            (
                3,
                vec![
                    (63, 1), (42, 1), (22, 2), (18, 1), (16, 1), (15, 1), (13, 3),
                    (12, 1), (11, 2), (10, 2), (9, 5), (8, 4), (7, 5), (6, 5),
                    (5, 6), (4, 12), (3, 21), (2, 40), (1, 80), (0, 107),
                ],
            ),
        ],
    )
});

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PercentileOutcome {
    Ranked {
        loan_count: u32,
        grade: u32,
        percentile: f64,
    },
    UnknownGrade {
        grade: u32,
    },
}

impl PercentileOutcome {
    /// Short form shown next to the student's name, e.g. `47.3%`.
    pub fn short_text(&self) -> String {
        match self {
            PercentileOutcome::Ranked { percentile, .. } => format!("{:.1}%", percentile),
            PercentileOutcome::UnknownGrade { grade } => format!("{}학년 데이터 없음", grade),
        }
    }
}

impl fmt::Display for PercentileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PercentileOutcome::Ranked {
                loan_count,
                grade,
                percentile,
            } => write!(
                f,
                "{}권은 {}학년 전체에서 상위 {:.1}% 입니다.",
                loan_count, grade, percentile
            ),
            PercentileOutcome::UnknownGrade { grade } => {
                write!(f, "{}학년 데이터가 없습니다.", grade)
            }
        }
    }
}

impl ReferenceDistribution {
    pub fn new<I>(population: u32, grades: I) -> Self
    where
        I: IntoIterator<Item = (u32, Vec<(u32, u32)>)>,
    {
        let grades = grades
            .into_iter()
            .map(|(grade, counts)| (grade, counts.into_iter().collect()))
            .collect();
        Self { grades, population }
    }

    /// The built-in school reference data.
    pub fn standard() -> &'static ReferenceDistribution {
        &DEFAULT_DISTRIBUTION
    }

    #[cfg(test)]
    pub fn population(&self) -> u32 {
        self.population
    }

    #[cfg(test)]
    pub fn grade(&self, grade: u32) -> Option<&BTreeMap<u32, u32>> {
        self.grades.get(&grade)
    }

    #[cfg(test)]
    pub fn grades(&self) -> impl Iterator<Item = u32> + '_ {
        self.grades.keys().copied()
    }

    pub fn percentile(&self, loan_count: u32, grade: u32) -> PercentileOutcome {
        let Some(dist) = self.grades.get(&grade) else {
            return PercentileOutcome::UnknownGrade { grade };
        };

        let students_above: u32 = dist
            .range((Bound::Excluded(loan_count), Bound::Unbounded))
            .map(|(_, n)| n)
            .sum();
        let students_equal = dist.get(&loan_count).copied().unwrap_or(0);

        let standing = (students_above as f64 + students_equal as f64 / 2.0) / self.population as f64;
        PercentileOutcome::Ranked {
            loan_count,
            grade,
            percentile: 100.0 * (1.0 - standing),
        }
    }
}
