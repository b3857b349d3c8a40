//! Feature selection.

use std::io::{BufRead, Write};

use super::console::Console;
use super::WorkflowError;
use crate::feedback::{Feature, FeedbackItem};

/// Numbered listing of ranked feature requests.
pub fn render_features(items: &[FeedbackItem]) -> String {
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        out.push_str(&format!(
            "{}. {} (Impact Score: {:.2})\n   Source: {}\n   User: {}\n\n",
            i + 1,
            item.title(),
            item.impact(),
            item.source,
            item.user
        ));
    }
    out
}

/// Pick feature `number` (1-based) without prompting.
pub fn preselect(items: &[FeedbackItem], number: usize) -> Result<Feature, WorkflowError> {
    if items.is_empty() {
        return Err(WorkflowError::NoFeatures);
    }
    number
        .checked_sub(1)
        .and_then(|i| items.get(i))
        .map(Feature::from)
        .ok_or_else(|| {
            WorkflowError::InvalidSelection(format!(
                "feature {} does not exist (1-{})",
                number,
                items.len()
            ))
        })
}

/// Show the features and ask the operator to pick one.
///
/// Returns `None` when the operator quits or input ends. Invalid answers are
/// reported and asked again.
pub fn select_feature<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    items: &[FeedbackItem],
) -> Result<Option<Feature>, WorkflowError> {
    if items.is_empty() {
        return Err(WorkflowError::NoFeatures);
    }

    console.say("\nFeature requests")?;
    console.say("================\n")?;
    console.print(render_features(items))?;

    let question =
        format!("Select a feature number to continue (1-{}), or 'q' to quit:", items.len());

    loop {
        let Some(answer) = console.prompt(&question)? else {
            return Ok(None);
        };
        if answer.eq_ignore_ascii_case("q") {
            return Ok(None);
        }

        match answer.parse::<usize>() {
            Ok(n) if (1..=items.len()).contains(&n) => {
                let feature = Feature::from(&items[n - 1]);
                console.say(format!("Selected: {}", feature.title))?;
                tracing::info!(feature = %feature.title, "Feature selected");
                return Ok(Some(feature));
            }
            Ok(_) => console.say("Invalid selection. Please try again.")?,
            Err(_) => console.say("Invalid input. Please enter a number.")?,
        }
    }
}
