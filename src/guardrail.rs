//! # Guardrail Evaluator
//!
//! Pure admission control for a chunk of frames against a session's caps. This module owns
//! the counters on [`SessionState`] — nothing else is allowed to write `frames_received`,
//! `bytes_received`, or `chunks_received`. Keeping the check order and the commit in one place
//! means the REST adapter and the stream handler can never disagree about what a chunk costs.

use crate::error::AppError;
use crate::session::SessionState;

/// Evaluates a chunk of `n_frames` totaling `total_bytes` (the per-frame sizes given in
/// `frame_sizes`) against `state`, committing counters on success.
///
/// Check order is load-bearing: session state, then chunk shape, then per-frame size, then
/// cumulative session caps. The first failing check wins.
pub fn evaluate(
    state: &mut SessionState,
    n_frames: u32,
    total_bytes: u64,
    frame_sizes: &[usize],
) -> Result<(), AppError> {
    if state.finished {
        return Err(AppError::SessionAlreadyFinished);
    }

    if n_frames == 0 || n_frames > state.max_chunk_size {
        return Err(AppError::ChunkSizeExceeded);
    }

    if frame_sizes
        .iter()
        .any(|&len| len as u64 > u64::from(state.max_frame_bytes))
    {
        return Err(AppError::FrameTooLarge);
    }

    if state.frames_received + n_frames > state.max_frames {
        return Err(AppError::MaxFramesExceeded);
    }

    if state.bytes_received + total_bytes > state.max_bytes() {
        return Err(AppError::MaxBytesExceeded);
    }

    state.frames_received += n_frames;
    state.bytes_received += total_bytes;
    state.chunks_received += 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::session::SessionId;

    fn fresh_state() -> SessionState {
        SessionState::new(SessionId::new(), &Config::default())
    }

    #[test]
    fn accepts_and_commits_counters() {
        let mut s = fresh_state();
        let sizes = [100usize, 200, 150];
        let result = evaluate(&mut s, 3, 450, &sizes);
        assert!(result.is_ok());
        assert_eq!(s.frames_received, 3);
        assert_eq!(s.bytes_received, 450);
        assert_eq!(s.chunks_received, 1);
    }

    #[test]
    fn rejects_already_finished_first() {
        let mut s = fresh_state();
        s.finished = true;
        let result = evaluate(&mut s, 0, 0, &[]);
        assert_eq!(result, Err(AppError::SessionAlreadyFinished));
        assert_eq!(s.chunks_received, 0);
    }

    #[test]
    fn rejects_zero_or_oversized_chunk() {
        let mut s = fresh_state();
        assert_eq!(evaluate(&mut s, 0, 0, &[]), Err(AppError::ChunkSizeExceeded));
        let big = s.max_chunk_size + 1;
        assert_eq!(
            evaluate(&mut s, big, 1, &vec![1; big as usize]),
            Err(AppError::ChunkSizeExceeded)
        );
    }

    #[test]
    fn rejects_oversized_frame_before_caps() {
        let mut s = fresh_state();
        let huge = (s.max_frame_bytes + 1) as usize;
        let result = evaluate(&mut s, 1, huge as u64, &[huge]);
        assert_eq!(result, Err(AppError::FrameTooLarge));
        assert_eq!(s.frames_received, 0);
    }

    #[test]
    fn rejects_when_frame_count_would_exceed_max_frames() {
        let mut s = fresh_state();
        s.frames_received = s.max_frames - 1;
        let result = evaluate(&mut s, 2, 2, &[1, 1]);
        assert_eq!(result, Err(AppError::MaxFramesExceeded));
    }

    #[test]
    fn rejects_when_bytes_would_exceed_max_bytes() {
        let mut s = fresh_state();
        let cap = s.max_bytes();
        s.bytes_received = cap - 1;
        let result = evaluate(&mut s, 1, 2, &[2]);
        assert_eq!(result, Err(AppError::MaxBytesExceeded));
    }

    #[test]
    fn check_order_session_state_beats_chunk_shape() {
        let mut s = fresh_state();
        s.finished = true;
        // n_frames == 0 would also fail chunk-shape, but finished must win.
        assert_eq!(evaluate(&mut s, 0, 0, &[]), Err(AppError::SessionAlreadyFinished));
    }

    #[test]
    fn check_order_frame_size_beats_session_caps() {
        let mut s = fresh_state();
        s.frames_received = s.max_frames; // would already fail max_frames_exceeded
        let huge = (s.max_frame_bytes + 1) as usize;
        let result = evaluate(&mut s, 1, huge as u64, &[huge]);
        assert_eq!(result, Err(AppError::FrameTooLarge));
    }
}
