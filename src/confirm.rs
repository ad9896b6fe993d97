//! Human-in-the-loop collaborators: ambiguous-match confirmation and
//! library section selection.
//!
//! The matching core depends only on the traits here, so it never touches
//! a terminal; tests substitute scripted implementations.

use std::io::{BufRead, Write};
use std::sync::Mutex;
use std::time::Duration;

use crossbeam_channel::bounded;

use crate::backend::LibrarySection;
use crate::models::{CandidateTrack, ScoredCandidate, TrackQuery};

// ============================================================================
// Traits
// ============================================================================

/// Resolves an ambiguous match decision. Returning `None` means decline;
/// implementations are expected to treat a timeout the same way.
pub trait Confirm: Sync {
    fn confirm(&self, query: &TrackQuery, candidates: &[ScoredCandidate])
        -> Option<CandidateTrack>;
}

/// Chooses one library section out of those available on the server.
/// Duplicate section names are allowed; disambiguation is by index.
pub trait SectionPicker {
    fn pick(&self, sections: &[LibrarySection]) -> Option<LibrarySection>;
}

// ============================================================================
// Console implementations
// ============================================================================

/// Interactive confirmation over stdin/stdout with a response timeout.
/// Prompts from concurrent jobs are serialized so the numbered lists never
/// interleave; only the prompting job blocks while waiting.
pub struct ConsoleConfirm {
    timeout: Duration,
    prompt_lock: Mutex<()>,
}

impl ConsoleConfirm {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            prompt_lock: Mutex::new(()),
        }
    }

    fn read_line_with_timeout(&self) -> Option<String> {
        let (tx, rx) = bounded(1);
        // The reader thread may outlive the timeout; it exits after the
        // next line regardless of whether anyone is still listening.
        std::thread::spawn(move || {
            let mut line = String::new();
            if std::io::stdin().lock().read_line(&mut line).is_ok() {
                let _ = tx.send(line);
            }
        });
        rx.recv_timeout(self.timeout).ok()
    }
}

impl Confirm for ConsoleConfirm {
    fn confirm(
        &self,
        query: &TrackQuery,
        candidates: &[ScoredCandidate],
    ) -> Option<CandidateTrack> {
        let _guard = self.prompt_lock.lock().unwrap_or_else(|e| e.into_inner());

        println!("\nAmbiguous match for '{}':", query.label());
        for (i, sc) in candidates.iter().enumerate() {
            let album = sc.candidate.album.as_deref().unwrap_or("-");
            println!(
                "  {}. {} - {} ({}) [score {:.2}]",
                i + 1,
                sc.candidate.artist,
                sc.candidate.title,
                album,
                sc.score
            );
        }
        print!("Pick a number, or press Enter to skip: ");
        let _ = std::io::stdout().flush();

        let line = match self.read_line_with_timeout() {
            Some(line) => line,
            None => {
                println!("\nNo response within {:?}, skipping.", self.timeout);
                return None;
            }
        };

        let choice: usize = line.trim().parse().ok()?;
        if choice >= 1 && choice <= candidates.len() {
            Some(candidates[choice - 1].candidate.clone())
        } else {
            None
        }
    }
}

/// Non-interactive confirmation policy: decline everything. Used for
/// unattended runs where only automatic accepts should mutate playlists.
pub struct DeclineAll;

impl Confirm for DeclineAll {
    fn confirm(&self, _query: &TrackQuery, _candidates: &[ScoredCandidate])
        -> Option<CandidateTrack> {
        None
    }
}

/// Numbered section menu on the console, matching the original operator
/// flow (two sections may both be named "Music"; the number decides).
pub struct ConsolePicker;

impl SectionPicker for ConsolePicker {
    fn pick(&self, sections: &[LibrarySection]) -> Option<LibrarySection> {
        if sections.is_empty() {
            return None;
        }
        println!("Available music libraries:");
        for (i, section) in sections.iter().enumerate() {
            println!("  {}. {} (id {})", i + 1, section.title, section.id);
        }
        print!("Select a library: ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line).ok()?;
        let choice: usize = line.trim().parse().ok()?;
        if choice >= 1 && choice <= sections.len() {
            Some(sections[choice - 1].clone())
        } else {
            None
        }
    }
}
