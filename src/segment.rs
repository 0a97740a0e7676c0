//! Segment assignment rules, segment summaries, and export cohorts

use std::fmt;

use crate::score::ScoredCustomer;

/// The ten fixed marketing segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    Hibernating,
    AtRisk,
    CantLoose,
    AboutToSleep,
    NeedAttention,
    LoyalCustomers,
    Promising,
    NewCustomers,
    PotentialLoyalists,
    Champions,
}

impl Segment {
    /// Every segment, in rule-table order.
    pub const ALL: [Segment; 10] = [
        Segment::Hibernating,
        Segment::AtRisk,
        Segment::CantLoose,
        Segment::AboutToSleep,
        Segment::NeedAttention,
        Segment::LoyalCustomers,
        Segment::Promising,
        Segment::NewCustomers,
        Segment::PotentialLoyalists,
        Segment::Champions,
    ];

    /// Stable label used in exports and summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::Hibernating => "hibernating",
            Segment::AtRisk => "at_risk",
            Segment::CantLoose => "cant_loose",
            Segment::AboutToSleep => "about_to_sleep",
            Segment::NeedAttention => "need_attention",
            Segment::LoyalCustomers => "loyal_customers",
            Segment::Promising => "promising",
            Segment::NewCustomers => "new_customers",
            Segment::PotentialLoyalists => "potential_loyalists",
            Segment::Champions => "champions",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One row of the segment rule table: inclusive score ranges over the
/// recency and frequency digits.
struct SegmentRule {
    recency: (u8, u8),
    frequency: (u8, u8),
    segment: Segment,
}

impl SegmentRule {
    fn matches(&self, recency_score: u8, frequency_score: u8) -> bool {
        (self.recency.0..=self.recency.1).contains(&recency_score)
            && (self.frequency.0..=self.frequency.1).contains(&frequency_score)
    }
}

/// Ordered rule table; the first matching rule wins. The ranges cover
/// all 25 recency/frequency score pairs without overlap.
const SEGMENT_RULES: [SegmentRule; 10] = [
    SegmentRule { recency: (1, 2), frequency: (1, 2), segment: Segment::Hibernating },
    SegmentRule { recency: (1, 2), frequency: (3, 4), segment: Segment::AtRisk },
    SegmentRule { recency: (1, 2), frequency: (5, 5), segment: Segment::CantLoose },
    SegmentRule { recency: (3, 3), frequency: (1, 2), segment: Segment::AboutToSleep },
    SegmentRule { recency: (3, 3), frequency: (3, 3), segment: Segment::NeedAttention },
    SegmentRule { recency: (3, 4), frequency: (4, 5), segment: Segment::LoyalCustomers },
    SegmentRule { recency: (4, 4), frequency: (1, 1), segment: Segment::Promising },
    SegmentRule { recency: (5, 5), frequency: (1, 1), segment: Segment::NewCustomers },
    SegmentRule { recency: (4, 5), frequency: (2, 3), segment: Segment::PotentialLoyalists },
    SegmentRule { recency: (5, 5), frequency: (4, 5), segment: Segment::Champions },
];

/// Map a recency/frequency score pair to its segment.
///
/// Every pair in 1..=5 x 1..=5 is covered; a miss means the rule table
/// itself is broken, which surfaces as an error rather than an
/// unlabeled customer.
pub fn assign_segment(recency_score: u8, frequency_score: u8) -> crate::Result<Segment> {
    SEGMENT_RULES
        .iter()
        .find(|rule| rule.matches(recency_score, frequency_score))
        .map(|rule| rule.segment)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "segment rule table does not cover score pair {recency_score}{frequency_score}"
            )
        })
}

/// Final table row: metrics, composite codes, and the assigned segment.
/// The per-metric scores are folded into the codes and dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentedCustomer {
    pub customer_id: i64,
    pub recency: i64,
    pub frequency: u32,
    pub monetary: f64,
    pub rf_code: String,
    pub rfm_code: String,
    pub segment: Segment,
}

/// Label every scored customer.
pub fn segment_customers(scored: &[ScoredCustomer]) -> crate::Result<Vec<SegmentedCustomer>> {
    scored
        .iter()
        .map(|customer| {
            let segment = assign_segment(customer.recency_score, customer.frequency_score)?;
            Ok(SegmentedCustomer {
                customer_id: customer.customer_id,
                recency: customer.recency,
                frequency: customer.frequency,
                monetary: customer.monetary,
                rf_code: customer.rf_code.clone(),
                rfm_code: customer.rfm_code.clone(),
                segment,
            })
        })
        .collect()
}

/// Per-segment aggregates for the pipeline summary table.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSummary {
    pub segment: Segment,
    pub customers: usize,
    pub avg_recency: f64,
    pub avg_frequency: f64,
    pub total_monetary: f64,
}

/// Aggregate recency/frequency/monetary per segment, in rule-table
/// order. Segments with no customers are omitted.
pub fn summarize_segments(customers: &[SegmentedCustomer]) -> Vec<SegmentSummary> {
    Segment::ALL
        .iter()
        .filter_map(|&segment| {
            let rows: Vec<&SegmentedCustomer> =
                customers.iter().filter(|c| c.segment == segment).collect();
            if rows.is_empty() {
                return None;
            }
            let count = rows.len() as f64;
            Some(SegmentSummary {
                segment,
                customers: rows.len(),
                avg_recency: rows.iter().map(|c| c.recency as f64).sum::<f64>() / count,
                avg_frequency: rows.iter().map(|c| f64::from(c.frequency)).sum::<f64>() / count,
                total_monetary: rows.iter().map(|c| c.monetary).sum(),
            })
        })
        .collect()
}

/// A fixed export cohort: customers whose three-digit code is an exact
/// member of `codes`.
#[derive(Debug, Clone, Copy)]
pub struct Cohort {
    pub name: &'static str,
    pub codes: &'static [&'static str],
}

impl Cohort {
    pub fn contains(&self, rfm_code: &str) -> bool {
        self.codes.contains(&rfm_code)
    }
}

/// Recent buyers who already spend in the top monetary tiers.
pub const NEW_HIGH_PAID: Cohort = Cohort {
    name: "new_high_paid",
    codes: &["514", "515", "524", "525", "545"],
};

/// Established top spenders.
pub const HIGH_PAID: Cohort = Cohort {
    name: "high_paid",
    codes: &[
        "434", "435", "443", "444", "445", "453", "454", "455", "533", "534", "535", "543",
        "544", "553", "554",
    ],
};

/// Mid-tier codes worth nurturing toward the high-paid lists.
// "34" is two digits and can never match a three-digit code; the entry
// is kept as shipped rather than guessed into a valid code.
pub const POTENTIAL_HIGH_PAID: Cohort = Cohort {
    name: "potential_high_paid",
    codes: &[
        "332", "333", "334", "335", "342", "343", "34", "345", "352", "353", "354", "355",
        "432", "443", "452", "532", "542", "552",
    ],
};

/// Customers drifting away across every frequency and monetary tier.
pub const ABOUT_TO_LEAVE: Cohort = Cohort {
    name: "about_to_leave",
    codes: &[
        "211", "212", "213", "214", "215", "221", "222", "223", "224", "225", "231", "232",
        "233", "234", "235", "241", "242", "243", "244", "245", "251", "252", "253", "254",
        "255", "311", "312", "315", "321", "322", "325", "331", "341", "351",
    ],
};

/// The four cohorts exported at the end of every pipeline run.
pub const EXPORT_COHORTS: [Cohort; 4] =
    [NEW_HIGH_PAID, HIGH_PAID, POTENTIAL_HIGH_PAID, ABOUT_TO_LEAVE];

/// Rows whose three-digit code is an exact member of the cohort list.
pub fn filter_cohort<'a>(
    customers: &'a [SegmentedCustomer],
    cohort: &Cohort,
) -> Vec<&'a SegmentedCustomer> {
    customers
        .iter()
        .filter(|customer| cohort.contains(&customer.rfm_code))
        .collect()
}
