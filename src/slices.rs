//! User customization slices in the keymapper config file
//!
//! A slice is a region between two marker lines:
//!
//! ```text
//! ###  SLICE_MARK_START: keymaps  ###  EDITS OUTSIDE THESE MARKS WILL BE LOST ON UPGRADE
//! ...user content...
//! ###  SLICE_MARK_END: keymaps  ###  EDITS OUTSIDE THESE MARKS WILL BE LOST ON UPGRADE
//! ```
//!
//! The body is everything strictly between the end of the start-marker line
//! and the beginning of the end-marker line. Bodies are extracted from the
//! existing config and substituted into the freshly deployed one by name.
//! Marker lines and all text outside slices come from the new file.

use crate::error::{Result, SetupError};
use crate::prompt::{self, Confirmation, Prompter};
use regex::Regex;
use std::collections::BTreeMap;
use std::ops::Range;

/// Slice name to slice body
pub type SliceMap = BTreeMap<String, String>;

const START_PATTERN: &str = r"###  SLICE_MARK_START: (\w+)  ###.*";
const END_PATTERN: &str = r"###  SLICE_MARK_END: (\w+)  ###.*";

/// Attempts allowed for the barebones override confirmation
pub const BAREBONES_CONFIRM_ATTEMPTS: usize = 3;

/// One start/end pair found in a file
#[derive(Debug, Clone, PartialEq, Eq)]
struct SliceSpan {
    name: String,
    /// Byte range of the body
    body: Range<usize>,
}

/// Compiled marker patterns
#[derive(Debug, Clone)]
pub struct SliceScanner {
    start: Regex,
    end: Regex,
}

impl SliceScanner {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| SetupError::general(format!("invalid slice pattern: {}", e)))
        };
        Ok(Self {
            start: compile(START_PATTERN)?,
            end: compile(END_PATTERN)?,
        })
    }

    /// Pair start and end markers in order and validate them
    fn spans(&self, text: &str) -> Result<Vec<SliceSpan>> {
        let starts: Vec<_> = self.start.captures_iter(text).collect();
        let ends: Vec<_> = self.end.captures_iter(text).collect();

        if starts.len() != ends.len() {
            return Err(SetupError::mismatched_markers(format!(
                "{} start marker(s), {} end marker(s)",
                starts.len(),
                ends.len()
            )));
        }

        let mut spans = Vec::with_capacity(starts.len());
        let mut previous_end = 0;
        for (start, end) in starts.iter().zip(&ends) {
            let (Some(start_all), Some(start_name), Some(end_all), Some(end_name)) =
                (start.get(0), start.get(1), end.get(0), end.get(1))
            else {
                return Err(SetupError::mismatched_markers("marker line without a slice name"));
            };

            let name = start_name.as_str();
            if end_name.as_str() != name {
                return Err(SetupError::mismatched_markers(format!(
                    "start \"{}\" paired with end \"{}\"",
                    name,
                    end_name.as_str()
                )));
            }
            if start_all.start() < previous_end || end_all.start() < start_all.end() {
                return Err(SetupError::mismatched_markers(format!(
                    "markers for \"{}\" are out of order",
                    name
                )));
            }

            spans.push(SliceSpan {
                name: name.to_string(),
                body: start_all.end()..end_all.start(),
            });
            previous_end = end_all.end();
        }
        Ok(spans)
    }

    /// Extract every slice body by name
    pub fn extract(&self, text: &str) -> Result<SliceMap> {
        let spans = self.spans(text)?;
        let mut slices = SliceMap::new();
        for span in spans {
            if slices.contains_key(&span.name) {
                tracing::warn!("Slice \"{}\" appears more than once, keeping the last", span.name);
            }
            slices.insert(span.name, text[span.body].to_string());
        }
        tracing::debug!("Extracted {} slice(s)", slices.len());
        Ok(slices)
    }

    /// Substitute stored bodies into `new_text`. Slices missing from
    /// `slices` keep the new file's defaults.
    pub fn merge(&self, new_text: &str, slices: &SliceMap) -> Result<String> {
        let spans = self.spans(new_text)?;
        let mut merged = String::with_capacity(new_text.len());
        let mut cursor = 0;

        for span in spans {
            merged.push_str(&new_text[cursor..span.body.start]);
            match slices.get(&span.name) {
                Some(body) => merged.push_str(body),
                None => merged.push_str(&new_text[span.body.clone()]),
            }
            cursor = span.body.end;
        }
        merged.push_str(&new_text[cursor..]);
        Ok(merged)
    }
}

/// Extract slices with a freshly compiled scanner
pub fn extract_slices(text: &str) -> Result<SliceMap> {
    SliceScanner::new()?.extract(text)
}

/// Merge slices with a freshly compiled scanner
pub fn merge_slices(new_text: &str, slices: &SliceMap) -> Result<String> {
    SliceScanner::new()?.merge(new_text, slices)
}

/// Whether an existing config is the barebones variant
pub fn is_barebones(slices: &SliceMap) -> bool {
    slices.keys().any(|name| name.contains("barebones"))
}

/// Lifecycle position of the config file for this run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigState {
    NoExistingConfig,
    ExistingNoSlices,
    ExistingWithSlices,
    BarebonesExisting,
    BarebonesRequestedOverFull,
}

impl ConfigState {
    pub fn of(existing: Option<&SliceMap>, barebones_requested: bool) -> Self {
        match existing {
            None => Self::NoExistingConfig,
            Some(slices) if is_barebones(slices) => Self::BarebonesExisting,
            Some(_) if barebones_requested => Self::BarebonesRequestedOverFull,
            Some(slices) if slices.is_empty() => Self::ExistingNoSlices,
            Some(_) => Self::ExistingWithSlices,
        }
    }
}

/// Slices to carry forward and the config variant to deploy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub slices: SliceMap,
    pub barebones: bool,
}

/// Decide what survives the reinstall.
///
/// An existing barebones config stays barebones. Asking for barebones over
/// a full config needs an explicit "yes"; "n" stops the run cleanly and
/// running out of attempts stops it with an error.
pub fn reconcile_slices(
    slices: SliceMap,
    barebones_requested: bool,
    prompter: &mut dyn Prompter,
) -> Result<Reconciled> {
    match ConfigState::of(Some(&slices), barebones_requested) {
        ConfigState::BarebonesExisting => {
            println!("Found \"barebones\" type config file. Will upgrade with same type.");
            Ok(Reconciled {
                slices,
                barebones: true,
            })
        }
        ConfigState::BarebonesRequestedOverFull => {
            let question = "\nALERT:\n\
                Existing config file is not a barebones config, but the barebones CLI \n\
                option was specified. Do you want to proceed and replace the existing \n\
                config with a barebones config? This will discard all existing settings. \n\
                A timestamped backup of the existing config folder will still be made. \n\
                Enter \"YES\" to proceed or \"N\" to exit: ";
            match prompt::confirm_with_retries(
                prompter,
                question,
                "yes",
                "n",
                BAREBONES_CONFIRM_ATTEMPTS,
            )? {
                Confirmation::Confirmed => Ok(Reconciled {
                    slices: SliceMap::new(),
                    barebones: true,
                }),
                Confirmation::Declined => {
                    Err(SetupError::declined_cleanly("User chose to exit installer..."))
                }
                Confirmation::Exhausted => Err(SetupError::declined("User input invalid. Exiting...")),
            }
        }
        _ => Ok(Reconciled {
            slices,
            barebones: barebones_requested,
        }),
    }
}
