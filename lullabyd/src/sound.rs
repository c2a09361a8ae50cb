//! Resolving a sound selector to a playable file.
//!
//! A selector is a file name or relative path handed over by the UI. Each
//! player tries an ordered list of resolvers against the assets root and
//! plays the first candidate that the output can decode.

use std::path::{Path, PathBuf};

use log::debug;

use crate::platform::AudioOutput;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundSource {
    File(PathBuf),
    /// The platform's alarm sound, used when no selected file plays.
    SystemDefault,
}

pub type SoundResolver = fn(&Path, &str) -> PathBuf;

#[must_use]
pub fn as_given(root: &Path, selector: &str) -> PathBuf {
    root.join(selector)
}

#[must_use]
pub fn under_public_sounds(root: &Path, selector: &str) -> PathBuf {
    root.join("public").join("sounds").join(selector)
}

#[must_use]
pub fn under_sounds(root: &Path, selector: &str) -> PathBuf {
    root.join("sounds").join(selector)
}

/// Bundled sounds in `raw/` are stored under their bare name, so
/// `rain.mp3` resolves to `raw/rain`. The decoder sniffs the format.
#[must_use]
pub fn bundled_raw(root: &Path, selector: &str) -> PathBuf {
    let name = Path::new(selector)
        .file_stem()
        .map_or_else(|| selector.into(), PathBuf::from);
    root.join("raw").join(name)
}

pub const ALARM_SOUND_RESOLVERS: [SoundResolver; 3] = [as_given, under_public_sounds, under_sounds];

pub const AMBIENT_SOUND_RESOLVERS: [SoundResolver; 4] =
    [under_public_sounds, under_sounds, as_given, bundled_raw];

#[must_use]
pub fn candidates(root: &Path, selector: &str, resolvers: &[SoundResolver]) -> Vec<PathBuf> {
    resolvers
        .iter()
        .map(|resolve| resolve(root, selector))
        .collect()
}

/// The first candidate `output` can play, if any. An empty selector matches
/// nothing.
#[must_use]
pub fn locate(
    output: &dyn AudioOutput,
    root: &Path,
    selector: &str,
    resolvers: &[SoundResolver],
) -> Option<PathBuf> {
    if selector.trim().is_empty() {
        return None;
    }
    candidates(root, selector, resolvers)
        .into_iter()
        .find(|path| match output.probe(path) {
            Ok(()) => true,
            Err(e) => {
                debug!("skipping sound candidate: {e}");
                false
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::tests::FakeOutput;

    #[test]
    fn alarm_and_ambient_orders_differ() {
        let root = Path::new("/assets");
        assert_eq!(
            candidates(root, "3.mp3", &ALARM_SOUND_RESOLVERS),
            vec![
                PathBuf::from("/assets/3.mp3"),
                PathBuf::from("/assets/public/sounds/3.mp3"),
                PathBuf::from("/assets/sounds/3.mp3"),
            ]
        );
        assert_eq!(
            candidates(root, "rain.mp3", &AMBIENT_SOUND_RESOLVERS)[0],
            PathBuf::from("/assets/public/sounds/rain.mp3")
        );
    }

    #[test]
    fn first_playable_candidate_wins() {
        let output = FakeOutput::with_files(&["/assets/sounds/3.mp3", "/assets/3.mp3"]);
        assert_eq!(
            locate(&output, Path::new("/assets"), "3.mp3", &ALARM_SOUND_RESOLVERS),
            Some(PathBuf::from("/assets/3.mp3"))
        );
        assert_eq!(
            locate(&output, Path::new("/assets"), "3.mp3", &AMBIENT_SOUND_RESOLVERS),
            Some(PathBuf::from("/assets/sounds/3.mp3"))
        );
    }

    #[test]
    fn ambient_sounds_fall_back_to_bundled_raw_by_name() {
        let root = Path::new("/assets");
        assert_eq!(bundled_raw(root, "rain.mp3"), PathBuf::from("/assets/raw/rain"));
        assert_eq!(bundled_raw(root, "waves"), PathBuf::from("/assets/raw/waves"));

        let output = FakeOutput::with_files(&["/assets/raw/rain"]);
        assert_eq!(
            locate(&output, root, "rain.mp3", &AMBIENT_SOUND_RESOLVERS),
            Some(PathBuf::from("/assets/raw/rain"))
        );
        assert_eq!(locate(&output, root, "rain.mp3", &ALARM_SOUND_RESOLVERS), None);
    }

    #[test]
    fn nothing_found_for_missing_or_empty_selector() {
        let output = FakeOutput::with_files(&["/assets/sounds/3.mp3"]);
        let root = Path::new("/assets");
        assert_eq!(locate(&output, root, "nope.mp3", &ALARM_SOUND_RESOLVERS), None);
        assert_eq!(locate(&output, root, "", &ALARM_SOUND_RESOLVERS), None);
        assert_eq!(locate(&output, root, "   ", &ALARM_SOUND_RESOLVERS), None);
    }
}
