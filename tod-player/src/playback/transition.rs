//! Track transition policy
//!
//! Pure index arithmetic: given the cursor, playlist length and the shuffle
//! and loop toggles, pick the next track or decide to stop. The caller owns
//! the cursor; how it moves on a stop depends on who asked (see
//! [`Decision::Stop`]).

use rand::Rng;

/// Resamples allowed when a shuffle pick lands on the current track
pub const SHUFFLE_RETRIES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Load and play this index
    Play(usize),
    /// End of a non-looping playlist: halt
    ///
    /// `candidate` is where sequential order would have gone. Manual skips
    /// move the cursor there; a natural track end leaves the cursor alone.
    Stop { candidate: usize },
}

/// Pick the track after (or before) `current`
///
/// Returns `None` for an empty playlist. With no cursor, sequential order
/// starts from index 0 in either direction.
pub fn next_index<R: Rng + ?Sized>(
    rng: &mut R,
    current: Option<usize>,
    len: usize,
    shuffle: bool,
    loop_playlist: bool,
    direction: Direction,
) -> Option<Decision> {
    if len == 0 {
        return None;
    }
    if shuffle {
        return Some(Decision::Play(shuffle_pick(rng, current, len)));
    }

    let Some(current) = current.map(|c| c % len) else {
        return Some(Decision::Play(0));
    };

    let (candidate, at_edge) = match direction {
        Direction::Next => ((current + 1) % len, current == len - 1),
        Direction::Prev => ((current + len - 1) % len, current == 0),
    };

    if at_edge && !loop_playlist {
        Some(Decision::Stop { candidate })
    } else {
        Some(Decision::Play(candidate))
    }
}

/// Uniform pick that tries not to repeat `current`
///
/// After [`SHUFFLE_RETRIES`] resamples the repeat is accepted, so this always
/// terminates.
pub fn shuffle_pick<R: Rng + ?Sized>(rng: &mut R, current: Option<usize>, len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    let mut pick = rng.gen_range(0..len);
    let mut resamples = 0;
    while Some(pick) == current && resamples < SHUFFLE_RETRIES {
        pick = rng.gen_range(0..len);
        resamples += 1;
    }
    pick
}
