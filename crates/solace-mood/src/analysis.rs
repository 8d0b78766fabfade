use std::collections::BTreeMap;

use crate::routes::{MoodReport, MoodSample};

/// Expressions that suggest the user could use a break.
const RESET_TRIGGERS: &[&str] = &["sad", "drowsy"];

/// Share of the log (in percent, after rounding) a trigger expression must
/// exceed before the report suggests a reset.
const RESET_SHARE_THRESHOLD: f64 = 20.0;

/// Builds the report for one batch of samples. The caller guarantees the
/// log is non-empty.
pub fn analyze(data_log: &[MoodSample]) -> MoodReport {
    let total = data_log.len();

    // Count in first-seen order so ties resolve to the earliest expression.
    let mut counts: Vec<(String, usize)> = Vec::new();
    for sample in data_log {
        match counts.iter_mut().find(|(mood, _)| *mood == sample.expression) {
            Some((_, n)) => *n += 1,
            None => counts.push((sample.expression.clone(), 1)),
        }
    }

    let mut distribution = BTreeMap::new();
    for (mood, n) in &counts {
        distribution.insert(mood.clone(), round1(*n as f64 / total as f64 * 100.0));
    }

    let (dominant, _) = counts.iter().fold(("", 0usize), |best, (mood, n)| {
        if *n > best.1 { (mood.as_str(), *n) } else { best }
    });
    let dominant_share = distribution.get(dominant).copied().unwrap_or(0.0);

    let report_message = if RESET_TRIGGERS.contains(&dominant)
        && dominant_share > RESET_SHARE_THRESHOLD
    {
        format!(
            "Your dominant state was {}. It's a perfect time for a quick mental reset! \
             Try the Face Matching Emoji Game to shift your focus and release some stress.",
            dominant.to_uppercase()
        )
    } else {
        "Your overall mood is balanced. Keep up the good work!".to_string()
    };

    MoodReport {
        success: true,
        total_samples: total,
        dominant_mood: dominant.to_uppercase(),
        report_message,
        pie_chart_data: distribution,
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
