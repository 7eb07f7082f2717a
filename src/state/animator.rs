//! Frame-by-frame position animation
//!
//! An [`Animation`] is an explicit generator: the caller asks for the frame at
//! a given instant and gets back a geometry command. Every animation carries a
//! [`TransitionToken`]; the owner keeps the token of the one live transition
//! and simply ignores frames whose token no longer matches.

use std::time::{Duration, Instant};

use crate::geometry::{GeometryCommand, Position};

/// Ease out cubic - decelerating to zero velocity
pub fn ease_out_cubic(t: f64) -> f64 {
    1.0 - (1.0 - t).powi(3)
}

/// Identifies one animated transition; stale tokens must have no effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransitionToken(u64);

/// Hands out strictly increasing transition tokens
#[derive(Debug, Default)]
pub struct TokenSource {
    next: u64,
}

impl TokenSource {
    pub fn issue(&mut self) -> TransitionToken {
        self.next += 1;
        TransitionToken(self.next)
    }
}

/// One emitted step of an animation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationFrame {
    /// Linear progress in `[0, 1]`
    pub progress: f64,
    pub position: Position,
    pub command: GeometryCommand,
    pub done: bool,
}

#[derive(Debug, Clone)]
pub struct Animation {
    token: TransitionToken,
    from: Position,
    to: Position,
    duration: Duration,
    started_at: Instant,
    finished: bool,
}

impl Animation {
    pub fn new(
        token: TransitionToken,
        from: Position,
        to: Position,
        duration: Duration,
        started_at: Instant,
    ) -> Self {
        Self {
            token,
            from,
            to,
            duration,
            started_at,
            finished: false,
        }
    }

    pub fn token(&self) -> TransitionToken {
        self.token
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Linear progress after `elapsed`, clamped to `[0, 1]`
    pub fn progress(&self, elapsed: Duration) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }

    /// Eased position after `elapsed`. Exactly the target once complete.
    pub fn position(&self, elapsed: Duration) -> Position {
        let progress = self.progress(elapsed);
        if progress >= 1.0 {
            return self.to;
        }

        let eased = ease_out_cubic(progress);
        Position::new(
            self.from.x + (self.to.x - self.from.x) * eased,
            self.from.y + (self.to.y - self.from.y) * eased,
        )
    }

    /// Frame for the display refresh at `now`; `None` once the final frame was emitted
    pub fn step(&mut self, now: Instant) -> Option<AnimationFrame> {
        if self.finished {
            return None;
        }

        let elapsed = now.saturating_duration_since(self.started_at);
        let progress = self.progress(elapsed);
        let position = self.position(elapsed);
        let done = progress >= 1.0;
        self.finished = done;

        Some(AnimationFrame {
            progress,
            position,
            // Intermediate frames are already interpolated; the host must not animate again
            command: GeometryCommand::position(position, false),
            done,
        })
    }

    /// Replay the animation on a simulated clock ticking every `frame`
    pub fn frames(self, frame: Duration) -> Frames {
        Frames {
            now: self.started_at,
            frame: frame.max(Duration::from_millis(1)),
            animation: self,
        }
    }
}

/// Iterator over the frames of an animation driven by a fixed refresh period
#[derive(Debug)]
pub struct Frames {
    animation: Animation,
    now: Instant,
    frame: Duration,
}

impl Iterator for Frames {
    type Item = AnimationFrame;

    fn next(&mut self) -> Option<Self::Item> {
        self.now += self.frame;
        self.animation.step(self.now)
    }
}

/// Stream of geometry commands moving the window from `from` to `to`
pub fn animate(
    from: Position,
    to: Position,
    duration: Duration,
    frame: Duration,
) -> impl Iterator<Item = GeometryCommand> {
    let token = TokenSource::default().issue();
    Animation::new(token, from, to, duration, Instant::now())
        .frames(frame)
        .map(|f| f.command)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(16);

    fn animation(duration_ms: u64) -> Animation {
        let token = TokenSource::default().issue();
        Animation::new(
            token,
            Position::new(0.0, 0.0),
            Position::new(100.0, 100.0),
            Duration::from_millis(duration_ms),
            Instant::now(),
        )
    }

    #[test]
    fn test_easing_endpoints() {
        assert_eq!(ease_out_cubic(0.0), 0.0);
        assert_eq!(ease_out_cubic(1.0), 1.0);
        assert!(ease_out_cubic(0.5) > 0.5);
    }

    #[test]
    fn test_progress_is_monotonic_and_ends_on_target() {
        let frames: Vec<_> = animation(150).frames(FRAME).collect();

        assert!(frames.len() >= 9);
        for pair in frames.windows(2) {
            assert!(pair[1].progress >= pair[0].progress);
            assert!(pair[1].position.x >= pair[0].position.x);
        }

        let last = frames.last().unwrap();
        assert!(last.done);
        assert_eq!(last.progress, 1.0);
        assert_eq!(last.command, GeometryCommand::position(Position::new(100.0, 100.0), false));
        assert!(frames[..frames.len() - 1].iter().all(|f| !f.done));
        assert!(frames.iter().all(|f| !f.command.animate));
    }

    #[test]
    fn test_no_frames_after_completion() {
        let mut anim = animation(50);
        let later = Instant::now() + Duration::from_secs(1);
        assert!(anim.step(later).unwrap().done);
        assert!(anim.is_finished());
        assert!(anim.step(later).is_none());
    }

    #[test]
    fn test_zero_duration_emits_only_target() {
        let frames: Vec<_> = animation(0).frames(FRAME).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].position, Position::new(100.0, 100.0));
    }

    #[test]
    fn test_animate_stream() {
        let commands: Vec<_> = animate(
            Position::new(1812.0, 972.0),
            Position::new(24.0, 24.0),
            Duration::from_millis(150),
            FRAME,
        )
        .collect();

        assert_eq!(commands.last().unwrap().x, Some(24.0));
        assert_eq!(commands.last().unwrap().y, Some(24.0));
        assert!(commands.iter().all(|c| c.width.is_none() && c.height.is_none()));
    }

    #[test]
    fn test_tokens_are_unique() {
        let mut source = TokenSource::default();
        let a = source.issue();
        let b = source.issue();
        assert_ne!(a, b);
    }
}
