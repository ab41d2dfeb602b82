use crate::{
    anim::Beat,
    core::{Fps, FrameIndex},
    error::{TrochiaError, TrochiaResult},
    render::RenderBackend,
    scene::{Node, Scene},
};

/// Per-beat lifecycle. A started beat always runs to completion; skipping
/// content means not scheduling the beat at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BeatState {
    Pending,
    Running,
    Committed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct BeatReport {
    pub state: BeatState,
    pub frames_emitted: u64,
    pub start_frame: FrameIndex,
    pub end_frame: FrameIndex,
}

/// Drives beats against a single global clock, strictly one at a time.
///
/// Within a beat every descriptor is sampled at the same time values
/// (cooperative lockstep, not threads); across beats ordering is strict:
/// beat N+1 cannot start before beat N is committed, which the synchronous
/// `run_beat` guarantees by shape.
#[derive(Clone, Debug)]
pub struct Scheduler {
    fps: Fps,
    clock: FrameIndex,
}

impl Scheduler {
    pub fn new(fps: Fps) -> Self {
        Self {
            fps,
            clock: FrameIndex(0),
        }
    }

    pub fn fps(&self) -> Fps {
        self.fps
    }

    pub fn clock(&self) -> FrameIndex {
        self.clock
    }

    /// Run one beat to completion: sample, render each frame, then snap every
    /// target to its exact t = 1 state and commit.
    #[tracing::instrument(
        skip_all,
        fields(
            descriptors = beat.descriptors().len(),
            duration_secs = beat.duration_secs(),
            start_frame = self.clock.0,
        )
    )]
    pub fn run_beat(
        &mut self,
        scene: &mut Scene,
        backend: &mut dyn RenderBackend,
        beat: Beat,
    ) -> TrochiaResult<BeatReport> {
        let start_frame = self.clock;

        // Resolve targets and snapshot baselines before the clock advances;
        // a missing or incompatible target fails the whole beat here.
        let mut baselines: Vec<Node> = Vec::with_capacity(beat.descriptors().len());
        for d in beat.descriptors() {
            let node = scene.find(&d.target).ok_or_else(|| {
                TrochiaError::malformed_beat(format!(
                    "descriptor targets unknown node '{}'",
                    d.target
                ))
            })?;
            d.op.check_target(node)?;
            baselines.push(node.clone());
        }
        // Pending -> Running: baselines are fixed, the beat will now run to
        // completion.
        let frames = if beat.is_instant() {
            0
        } else {
            self.fps.secs_to_frames_round(beat.duration_secs()).max(1)
        };

        for i in 1..=frames {
            let elapsed = beat.duration_secs() * (i as f64 / frames as f64);
            self.apply_all(scene, &beat, &baselines, elapsed)?;
            scene.render(backend)?;
        }

        // Commit: exact t = 1 for every descriptor, regardless of how the
        // sampled endpoint rounded.
        for (d, baseline) in beat.descriptors().iter().zip(&baselines) {
            let node = scene
                .find_mut(&d.target)
                .ok_or_else(|| TrochiaError::scene(format!("node '{}' vanished", d.target)))?;
            d.op.apply(baseline, node, d.ease.apply(1.0))?;
        }
        self.clock = FrameIndex(self.clock.0 + frames);

        tracing::debug!(
            frames,
            end_frame = self.clock.0,
            "beat committed"
        );
        Ok(BeatReport {
            state: BeatState::Committed,
            frames_emitted: frames,
            start_frame,
            end_frame: self.clock,
        })
    }

    fn apply_all(
        &self,
        scene: &mut Scene,
        beat: &Beat,
        baselines: &[Node],
        elapsed: f64,
    ) -> TrochiaResult<()> {
        for (d, baseline) in beat.descriptors().iter().zip(baselines) {
            let t = if d.duration_secs <= 0.0 {
                1.0
            } else {
                (elapsed / d.duration_secs).clamp(0.0, 1.0)
            };
            let node = scene
                .find_mut(&d.target)
                .ok_or_else(|| TrochiaError::scene(format!("node '{}' vanished", d.target)))?;
            d.op.apply(baseline, node, d.ease.apply(t))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        anim::{AnimationDescriptor, Beat, UpdateOp},
        core::{Canvas, Style},
        primitive::{Dot, Primitive},
        render::{NullBackend, RecordingBackend},
        scene::Node,
    };
    use kurbo::Point;

    fn scene_with_dot() -> Scene {
        let mut s = Scene::new(Canvas {
            width: 14,
            height: 8,
        });
        s.add(Node::shape(
            "p",
            Primitive::Dot(Dot::new(Point::ZERO)),
            Style::default(),
        ))
        .unwrap();
        s
    }

    fn move_beat() -> Beat {
        Beat::new(vec![AnimationDescriptor::new(
            "p",
            UpdateOp::MoveTo {
                to: Point::new(3.0, 1.0),
            },
            1.0,
        )])
        .unwrap()
    }

    #[test]
    fn committed_state_is_independent_of_sampling_density() {
        let mut final_anchors = Vec::new();
        for fps in [7u32, 24, 60, 240] {
            let mut scene = scene_with_dot();
            let mut backend = NullBackend;
            let mut sched = Scheduler::new(Fps::new(fps, 1).unwrap());
            sched.run_beat(&mut scene, &mut backend, move_beat()).unwrap();
            final_anchors.push(scene.find("p").unwrap().anchor());
        }
        for a in &final_anchors {
            assert_eq!(*a, Point::new(3.0, 1.0));
        }
    }

    #[test]
    fn beat_commits_and_advances_the_clock() {
        let mut scene = scene_with_dot();
        let mut backend = RecordingBackend::default();
        let mut sched = Scheduler::new(Fps::new(30, 1).unwrap());
        let report = sched
            .run_beat(&mut scene, &mut backend, move_beat())
            .unwrap();

        assert_eq!(report.state, BeatState::Committed);
        assert_eq!(report.frames_emitted, 30);
        assert_eq!(report.start_frame, FrameIndex(0));
        assert_eq!(report.end_frame, FrameIndex(30));
        assert_eq!(sched.clock(), FrameIndex(30));
        assert_eq!(backend.frames_presented, 30);
    }

    #[test]
    fn instant_beat_applies_once_and_emits_no_frames() {
        let mut scene = scene_with_dot();
        let mut backend = RecordingBackend::default();
        let mut sched = Scheduler::new(Fps::new(30, 1).unwrap());

        let beat = Beat::instant(vec![AnimationDescriptor::new(
            "p",
            UpdateOp::FadeTo { opacity: 0.0 },
            0.0,
        )])
        .unwrap();
        let report = sched.run_beat(&mut scene, &mut backend, beat).unwrap();

        assert_eq!(report.frames_emitted, 0);
        assert_eq!(backend.frames_presented, 0);
        assert_eq!(sched.clock(), FrameIndex(0));
        let Node::Shape { style, .. } = scene.find("p").unwrap() else {
            unreachable!()
        };
        assert_eq!(style.opacity, 0.0);
    }

    #[test]
    fn hold_emits_held_frames_without_state_change() {
        let mut scene = scene_with_dot();
        let before = scene.find("p").unwrap().anchor();
        let mut backend = RecordingBackend::default();
        let mut sched = Scheduler::new(Fps::new(10, 1).unwrap());
        sched
            .run_beat(&mut scene, &mut backend, Beat::hold(1.5).unwrap())
            .unwrap();
        assert_eq!(backend.frames_presented, 15);
        assert_eq!(scene.find("p").unwrap().anchor(), before);
    }

    #[test]
    fn missing_target_fails_before_the_clock_advances() {
        let mut scene = scene_with_dot();
        let mut backend = RecordingBackend::default();
        let mut sched = Scheduler::new(Fps::new(30, 1).unwrap());

        let beat = Beat::new(vec![AnimationDescriptor::new(
            "ghost",
            UpdateOp::Create,
            1.0,
        )])
        .unwrap();
        let err = sched.run_beat(&mut scene, &mut backend, beat).unwrap_err();
        assert!(matches!(err, TrochiaError::MalformedBeat(_)));
        assert_eq!(sched.clock(), FrameIndex(0));
        assert_eq!(backend.frames_presented, 0);
    }

    #[test]
    fn out_of_bounds_morph_plan_fails_before_playback() {
        use crate::{
            anim::MorphPlan,
            expr::{MonospaceTypesetter, Typesetter},
        };

        let mut scene = scene_with_dot();
        let expr = MonospaceTypesetter::default().layout("R\\theta").unwrap();
        scene
            .add(Node::expr("eq", expr.clone(), Style::default()))
            .unwrap();

        let plan = MorphPlan {
            new_expr: expr.clone(),
            pairs: vec![(expr.groups.len(), 0)],
            fade_out: Vec::new(),
            fade_in: Vec::new(),
        };
        let beat = Beat::new(vec![AnimationDescriptor::new(
            "eq",
            UpdateOp::Morph(plan),
            1.0,
        )])
        .unwrap();

        let mut backend = RecordingBackend::default();
        let mut sched = Scheduler::new(Fps::new(30, 1).unwrap());
        let err = sched.run_beat(&mut scene, &mut backend, beat).unwrap_err();
        assert!(matches!(err, TrochiaError::MalformedBeat(_)));
        assert_eq!(sched.clock(), FrameIndex(0));
        assert_eq!(backend.frames_presented, 0);
    }

    #[test]
    fn shorter_descriptor_holds_its_end_state() {
        let mut scene = scene_with_dot();
        scene
            .add(Node::shape(
                "q",
                Primitive::Dot(Dot::new(Point::ZERO)),
                Style::default(),
            ))
            .unwrap();
        let mut backend = NullBackend;
        let mut sched = Scheduler::new(Fps::new(30, 1).unwrap());

        let beat = Beat::new(vec![
            AnimationDescriptor::new(
                "p",
                UpdateOp::MoveTo {
                    to: Point::new(2.0, 0.0),
                },
                0.5,
            ),
            AnimationDescriptor::new(
                "q",
                UpdateOp::MoveTo {
                    to: Point::new(0.0, 2.0),
                },
                2.0,
            ),
        ])
        .unwrap();
        sched.run_beat(&mut scene, &mut backend, beat).unwrap();
        assert_eq!(scene.find("p").unwrap().anchor(), Point::new(2.0, 0.0));
        assert_eq!(scene.find("q").unwrap().anchor(), Point::new(0.0, 2.0));
    }
}
