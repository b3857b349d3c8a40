//! Interactive plan review.

use std::io::{BufRead, Write};

use super::console::Console;
use super::plan::{ApprovedPlan, Plan};
use super::WorkflowError;

/// How the operator left the editor.
#[derive(Debug)]
pub enum EditorOutcome {
    /// Plan approved
    Approved(ApprovedPlan),
    /// Operator asked for a fresh plan
    Regenerate,
    /// Operator quit (or input ended)
    Quit,
}

const MENU: &str = "\nOptions:\n  \
[c] Check/uncheck a step\n  \
[e] Edit a step description\n  \
[a] Add a new step\n  \
[r] Regenerate the plan\n  \
[s] Show the plan again\n  \
[x] Approve and continue\n  \
[q] Quit";

fn show<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    plan: &Plan,
    title: &str,
) -> std::io::Result<()> {
    console.say(format!("\nPlan for: {}", title))?;
    console.say(format!("Source: {}\n", plan.source))?;
    console.print(plan.render())?;
    console.say(MENU)
}

/// Ask for a step number. `Ok(None)` at end of input.
fn ask_step<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    question: &str,
) -> std::io::Result<Option<Option<usize>>> {
    let Some(answer) = console.prompt(question)? else {
        return Ok(None);
    };
    match answer.parse::<usize>() {
        Ok(n) => Ok(Some(Some(n))),
        Err(_) => {
            console.say("Please enter a valid number.")?;
            Ok(Some(None))
        }
    }
}

/// Let the operator review and edit a plan until they approve, regenerate or
/// quit.
pub fn review_plan<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    plan: &mut Plan,
    title: &str,
) -> Result<EditorOutcome, WorkflowError> {
    show(console, plan, title)?;

    loop {
        let Some(choice) = console.prompt("\nChoose action:")? else {
            return Ok(EditorOutcome::Quit);
        };

        match choice.to_lowercase().as_str() {
            "c" => {
                let Some(number) = ask_step(console, "Enter step number to check/uncheck:")? else {
                    return Ok(EditorOutcome::Quit);
                };
                let Some(number) = number else { continue };
                match plan.toggle(number) {
                    Ok(true) => console.say(format!("Step {} checked", number))?,
                    Ok(false) => console.say(format!("Step {} unchecked", number))?,
                    Err(e) => console.say(e.to_string())?,
                }
            }
            "e" => {
                let Some(number) = ask_step(console, "Enter step number to edit:")? else {
                    return Ok(EditorOutcome::Quit);
                };
                let Some(number) = number else { continue };
                let Some(current) = number
                    .checked_sub(1)
                    .and_then(|i| plan.steps().get(i))
                    .map(|s| s.description.clone())
                else {
                    console.say(WorkflowError::InvalidStep { number, count: plan.len() }.to_string())?;
                    continue;
                };

                console.say(format!("Current: {}", current))?;
                let Some(description) = console.prompt("New description:")? else {
                    return Ok(EditorOutcome::Quit);
                };
                if plan.edit(number, &description)? {
                    console.say("Step updated")?;
                } else {
                    console.say("Step unchanged")?;
                }
            }
            "a" => {
                let Some(description) = console.prompt("Enter new step description:")? else {
                    return Ok(EditorOutcome::Quit);
                };
                match plan.add(&description) {
                    Some(step) => {
                        let id = step.id.clone();
                        console.say(format!("Added {}", id))?;
                    }
                    None => console.say("Nothing added")?,
                }
            }
            "r" => return Ok(EditorOutcome::Regenerate),
            "s" => show(console, plan, title)?,
            "x" => match plan.approve() {
                Ok(approved) => {
                    console.say(format!("Plan approved with {} steps", approved.steps().len()))?;
                    return Ok(EditorOutcome::Approved(approved));
                }
                Err(e) => console.say(e.to_string())?,
            },
            "q" => return Ok(EditorOutcome::Quit),
            _ => console.say("Invalid choice. Please try again.")?,
        }
    }
}
