use std::collections::BTreeSet;

use kurbo::{Point, Vec2};

use crate::{
    anim_ease::Ease,
    error::{TrochiaError, TrochiaResult},
    expr::MathExpr,
    kinematics::RollingContact,
    scene::Node,
};

/// One scheduled animation: a target node, a typed update op, an ease and a
/// duration. Created per beat, consumed once, then discarded.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct AnimationDescriptor {
    pub target: String,
    pub op: UpdateOp,
    pub ease: Ease,
    pub duration_secs: f64,
}

impl AnimationDescriptor {
    pub fn new(target: impl Into<String>, op: UpdateOp, duration_secs: f64) -> Self {
        Self {
            target: target.into(),
            op,
            ease: Ease::Smooth,
            duration_secs,
        }
    }

    pub fn ease(mut self, ease: Ease) -> Self {
        self.ease = ease;
        self
    }
}

/// Closed set of update operations.
///
/// Every op is absolute in `t`: applying it re-derives the target's state
/// from the baseline snapshot taken at beat start, so sampling density can
/// never drift the committed end state.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum UpdateOp {
    /// Sweep the reveal fraction 0..1 (progressive outline drawing).
    Create,
    /// Move the node so its anchor lands on `to`.
    MoveTo { to: Point },
    Shift { by: Vec2 },
    RotateAbout { pivot: Point, angle: f64 },
    ScaleAbout { pivot: Point, factor: f64 },
    FadeTo { opacity: f64 },
    /// Glyph-level expression morph built by the rewrite machinery.
    Morph(MorphPlan),
    /// Rolling-without-slipping motion of a group between two orbit
    /// fractions. The baseline must be the pose at `from_fraction`.
    Roll {
        contact: RollingContact,
        from_fraction: f64,
        to_fraction: f64,
    },
}

/// Glyph-group correspondence for a partial expression rewrite.
///
/// `pairs` are (old index, new index) matches that interpolate position;
/// unmatched old groups fade out, unmatched new groups fade in. At t = 1 the
/// target's expression becomes `new_expr` exactly.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct MorphPlan {
    pub new_expr: MathExpr,
    pub pairs: Vec<(usize, usize)>,
    pub fade_out: Vec<usize>,
    pub fade_in: Vec<usize>,
}

impl UpdateOp {
    pub fn validate(&self) -> TrochiaResult<()> {
        match self {
            Self::Create => Ok(()),
            Self::MoveTo { to } => {
                finite(to.x, "MoveTo target")?;
                finite(to.y, "MoveTo target")
            }
            Self::Shift { by } => {
                finite(by.x, "Shift delta")?;
                finite(by.y, "Shift delta")
            }
            Self::RotateAbout { angle, .. } => finite(*angle, "RotateAbout angle"),
            Self::ScaleAbout { factor, .. } => {
                if !factor.is_finite() || *factor <= 0.0 {
                    return Err(TrochiaError::malformed_beat(
                        "ScaleAbout factor must be finite and > 0",
                    ));
                }
                Ok(())
            }
            Self::FadeTo { opacity } => {
                if !opacity.is_finite() || !(0.0..=1.0).contains(opacity) {
                    return Err(TrochiaError::malformed_beat(
                        "FadeTo opacity must be in 0..=1",
                    ));
                }
                Ok(())
            }
            Self::Morph(plan) => {
                let new_len = plan.new_expr.groups.len();
                for &(_, j) in &plan.pairs {
                    if j >= new_len {
                        return Err(TrochiaError::malformed_beat(
                            "Morph pair index out of bounds in new expression",
                        ));
                    }
                }
                for &j in &plan.fade_in {
                    if j >= new_len {
                        return Err(TrochiaError::malformed_beat(
                            "Morph fade-in index out of bounds in new expression",
                        ));
                    }
                }
                Ok(())
            }
            Self::Roll {
                from_fraction,
                to_fraction,
                ..
            } => {
                finite(*from_fraction, "Roll fraction")?;
                finite(*to_fraction, "Roll fraction")
            }
        }
    }

    /// Check that the op can act on `node` at all (raised at beat
    /// construction, before the clock advances).
    pub fn check_target(&self, node: &Node) -> TrochiaResult<()> {
        if let Self::Morph(plan) = self {
            let Node::Expr { expr, .. } = node else {
                return Err(TrochiaError::malformed_beat(format!(
                    "morph target '{}' is not an expression",
                    node.name()
                )));
            };
            // Old-side indices can only be checked against the live target.
            let old_len = expr.groups.len();
            let mut old_indices = plan
                .pairs
                .iter()
                .map(|&(i, _)| i)
                .chain(plan.fade_out.iter().copied());
            if old_indices.any(|i| i >= old_len) {
                return Err(TrochiaError::malformed_beat(format!(
                    "Morph plan indexes past the groups of '{}'",
                    node.name()
                )));
            }
        }
        Ok(())
    }

    /// Re-derive `node` from `baseline` at eased progress `t`.
    pub fn apply(&self, baseline: &Node, node: &mut Node, t: f64) -> TrochiaResult<()> {
        *node = baseline.clone();
        match self {
            Self::Create => node.set_reveal(t),
            Self::MoveTo { to } => {
                let from = baseline.anchor();
                let pos = from.lerp(*to, t);
                node.translate(pos - from);
            }
            Self::Shift { by } => node.translate(*by * t),
            Self::RotateAbout { pivot, angle } => node.rotate_about(*pivot, angle * t),
            Self::ScaleAbout { pivot, factor } => {
                node.scale_about(*pivot, 1.0 + (factor - 1.0) * t);
            }
            Self::FadeTo { opacity } => node.fade_toward(*opacity, t),
            Self::Morph(plan) => apply_morph(plan, node, t)?,
            Self::Roll {
                contact,
                from_fraction,
                to_fraction,
            } => {
                let start = contact.advance(*from_fraction);
                let now = contact.advance(from_fraction + (to_fraction - from_fraction) * t);
                node.translate(now.center - start.center);
                node.rotate_about(now.center, now.self_rotation - start.self_rotation);
            }
        }
        Ok(())
    }
}

fn apply_morph(plan: &MorphPlan, node: &mut Node, t: f64) -> TrochiaResult<()> {
    let Node::Expr { expr, .. } = node else {
        return Err(TrochiaError::malformed_beat(
            "morph target is not an expression",
        ));
    };
    if t >= 1.0 {
        *expr = plan.new_expr.clone();
        return Ok(());
    }

    let old = expr.clone();
    let to_local = |pos: Point| (pos - old.anchor) / old.scale;

    let mut groups = Vec::with_capacity(old.groups.len() + plan.fade_in.len());
    for &(i, j) in &plan.pairs {
        let pos = old.abs_position(i).lerp(plan.new_expr.abs_position(j), t);
        let mut g = old.groups[i].clone();
        g.offset = to_local(pos);
        groups.push(g);
    }
    for &i in &plan.fade_out {
        let mut g = old.groups[i].clone();
        g.opacity *= 1.0 - t;
        groups.push(g);
    }
    for &j in &plan.fade_in {
        let mut g = plan.new_expr.groups[j].clone();
        g.offset = to_local(plan.new_expr.abs_position(j));
        g.opacity *= t;
        groups.push(g);
    }
    expr.groups = groups;
    Ok(())
}

fn finite(v: f64, what: &str) -> TrochiaResult<()> {
    if !v.is_finite() {
        return Err(TrochiaError::malformed_beat(format!(
            "{what} must be finite"
        )));
    }
    Ok(())
}

/// One unit of concurrent animation. Descriptors in a beat run in lockstep
/// against a shared clock; no two may share a target.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Beat {
    descriptors: Vec<AnimationDescriptor>,
    duration_secs: f64,
}

impl Beat {
    /// A timed beat. Duration is the longest descriptor duration; shorter
    /// descriptors clamp at their own t = 1 and hold.
    pub fn new(descriptors: Vec<AnimationDescriptor>) -> TrochiaResult<Self> {
        if descriptors.is_empty() {
            return Err(TrochiaError::malformed_beat(
                "beat has no descriptors (use Beat::hold for a pause)",
            ));
        }
        validate_descriptors(&descriptors)?;
        let duration_secs = descriptors
            .iter()
            .map(|d| d.duration_secs)
            .fold(0.0, f64::max);
        if duration_secs <= 0.0 {
            return Err(TrochiaError::malformed_beat(
                "timed beat needs a duration > 0 (use Beat::instant)",
            ));
        }
        if descriptors.iter().any(|d| d.duration_secs <= 0.0) {
            return Err(TrochiaError::malformed_beat(
                "zero-duration descriptor in a non-degenerate beat",
            ));
        }
        Ok(Self {
            descriptors,
            duration_secs,
        })
    }

    /// A degenerate beat: applies every op at t = 1 exactly once, emits no
    /// frames and commits immediately.
    pub fn instant(descriptors: Vec<AnimationDescriptor>) -> TrochiaResult<Self> {
        if descriptors.is_empty() {
            return Err(TrochiaError::malformed_beat("instant beat has no descriptors"));
        }
        validate_descriptors(&descriptors)?;
        if descriptors.iter().any(|d| d.duration_secs != 0.0) {
            return Err(TrochiaError::malformed_beat(
                "instant beat descriptors must all have duration 0",
            ));
        }
        Ok(Self {
            descriptors,
            duration_secs: 0.0,
        })
    }

    /// A pause: no state changes, held frames for `duration_secs`.
    pub fn hold(duration_secs: f64) -> TrochiaResult<Self> {
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return Err(TrochiaError::malformed_beat("hold duration must be > 0"));
        }
        Ok(Self {
            descriptors: Vec::new(),
            duration_secs,
        })
    }

    pub fn descriptors(&self) -> &[AnimationDescriptor] {
        &self.descriptors
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn is_instant(&self) -> bool {
        self.duration_secs == 0.0
    }
}

fn validate_descriptors(descriptors: &[AnimationDescriptor]) -> TrochiaResult<()> {
    let mut targets = BTreeSet::new();
    for d in descriptors {
        if d.target.trim().is_empty() {
            return Err(TrochiaError::malformed_beat("descriptor target is empty"));
        }
        if !targets.insert(d.target.as_str()) {
            return Err(TrochiaError::malformed_beat(format!(
                "two descriptors target '{}' in one beat",
                d.target
            )));
        }
        if !d.duration_secs.is_finite() || d.duration_secs < 0.0 {
            return Err(TrochiaError::malformed_beat(format!(
                "descriptor for '{}' has a negative or non-finite duration",
                d.target
            )));
        }
        d.op.validate()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::Style,
        primitive::{Dot, Primitive},
    };

    fn dot_node(name: &str, x: f64) -> Node {
        Node::shape(
            name,
            Primitive::Dot(Dot::new(Point::new(x, 0.0))),
            Style::default(),
        )
    }

    #[test]
    fn duplicate_targets_are_rejected() {
        let a = AnimationDescriptor::new("n", UpdateOp::Create, 1.0);
        let b = AnimationDescriptor::new("n", UpdateOp::FadeTo { opacity: 0.0 }, 1.0);
        assert!(matches!(
            Beat::new(vec![a, b]),
            Err(TrochiaError::MalformedBeat(_))
        ));
    }

    #[test]
    fn mixed_zero_and_timed_durations_are_rejected() {
        let a = AnimationDescriptor::new("a", UpdateOp::Create, 1.0);
        let b = AnimationDescriptor::new("b", UpdateOp::Create, 0.0);
        assert!(Beat::new(vec![a, b]).is_err());
    }

    #[test]
    fn instant_requires_all_zero_durations() {
        let a = AnimationDescriptor::new("a", UpdateOp::FadeTo { opacity: 0.0 }, 0.0);
        assert!(Beat::instant(vec![a.clone()]).is_ok());
        let b = AnimationDescriptor::new("b", UpdateOp::Create, 0.5);
        assert!(Beat::instant(vec![a, b]).is_err());
    }

    #[test]
    fn bad_scale_factor_is_rejected_at_construction() {
        let d = AnimationDescriptor::new(
            "a",
            UpdateOp::ScaleAbout {
                pivot: Point::ZERO,
                factor: 0.0,
            },
            1.0,
        );
        assert!(Beat::new(vec![d]).is_err());
    }

    #[test]
    fn morph_plan_indices_are_checked_on_both_sides() {
        use crate::expr::{MonospaceTypesetter, Typesetter};

        let expr = MonospaceTypesetter::default().layout("R\\theta").unwrap();
        let node = Node::expr("eq", expr.clone(), Style::default());

        // New-side: a fade-in index past the new expression fails validation.
        let plan = MorphPlan {
            new_expr: expr.clone(),
            pairs: vec![],
            fade_out: vec![],
            fade_in: vec![expr.groups.len()],
        };
        let d = AnimationDescriptor::new("eq", UpdateOp::Morph(plan), 1.0);
        assert!(matches!(
            Beat::new(vec![d]),
            Err(TrochiaError::MalformedBeat(_))
        ));

        // Old-side: a pair past the live target fails the target check.
        let plan = MorphPlan {
            new_expr: expr.clone(),
            pairs: vec![(expr.groups.len(), 0)],
            fade_out: vec![],
            fade_in: vec![],
        };
        let err = UpdateOp::Morph(plan).check_target(&node).unwrap_err();
        assert!(matches!(err, TrochiaError::MalformedBeat(_)));

        // Old-side fade-outs are held to the same bound.
        let plan = MorphPlan {
            new_expr: expr.clone(),
            pairs: vec![],
            fade_out: vec![expr.groups.len()],
            fade_in: vec![],
        };
        assert!(UpdateOp::Morph(plan).check_target(&node).is_err());
    }

    #[test]
    fn ops_are_absolute_in_t() {
        let baseline = dot_node("a", 0.0);
        let op = UpdateOp::Shift {
            by: Vec2::new(10.0, 0.0),
        };

        // Dense sampling then t=1 equals a single t=1 application.
        let mut dense = baseline.clone();
        for i in 1..=97 {
            op.apply(&baseline, &mut dense, i as f64 / 97.0).unwrap();
        }
        let mut single = baseline.clone();
        op.apply(&baseline, &mut single, 1.0).unwrap();
        assert_eq!(dense.anchor(), single.anchor());
        assert_eq!(single.anchor(), Point::new(10.0, 0.0));
    }

    #[test]
    fn move_to_lands_exactly() {
        let baseline = dot_node("a", 1.0);
        let mut node = baseline.clone();
        let op = UpdateOp::MoveTo {
            to: Point::new(5.0, -2.0),
        };
        op.apply(&baseline, &mut node, 1.0).unwrap();
        assert_eq!(node.anchor(), Point::new(5.0, -2.0));
    }

    #[test]
    fn roll_preserves_the_no_slip_pose() {
        use crate::kinematics::RollingContact;
        use crate::primitive::Circle;
        use crate::scene::Group;

        let contact = RollingContact::new(3.0, 1.0, 1.0).unwrap();
        let mut g = Group::new("rolling");
        g.children.push(Node::shape(
            "rolling_circle",
            Primitive::Circle(Circle::new(contact.start_center(), 1.0).unwrap()),
            Style::default(),
        ));
        let baseline = Node::Group(g);
        let mut node = baseline.clone();

        let op = UpdateOp::Roll {
            contact,
            from_fraction: 0.0,
            to_fraction: 1.0 / 12.0,
        };
        op.apply(&baseline, &mut node, 1.0).unwrap();

        let expected = contact.advance(1.0 / 12.0);
        let Node::Group(g) = &node else { unreachable!() };
        let Node::Shape {
            primitive: Primitive::Circle(c),
            ..
        } = &g.children[0]
        else {
            unreachable!()
        };
        assert!((c.center - expected.center).hypot() < 1e-12);
        assert!((c.rotation - expected.self_rotation).abs() < 1e-12);
    }
}
