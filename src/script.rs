use std::f64::consts::{FRAC_PI_3, FRAC_PI_6, PI, TAU};

use kurbo::{Point, Vec2};

use crate::{
    anim::{AnimationDescriptor, Beat, UpdateOp},
    anim_ease::Ease,
    core::{Canvas, Fps, Rgba8, Style},
    error::{TrochiaError, TrochiaResult},
    expr::{MathExpr, Typesetter},
    kinematics::RollingContact,
    primitive::{Arc, Circle, Primitive, Segment},
    render::RenderBackend,
    rewrite::{matching_rewrite, relocate_role, replace},
    scene::{Group, Node, Scene},
    timeline::{BeatReport, Scheduler},
};

/// Everything a running presentation needs: the scene being mutated, the
/// scheduler that owns the clock, the draw sink and the typesetter.
pub struct Stage<'a> {
    pub scene: Scene,
    pub scheduler: Scheduler,
    backend: &'a mut dyn RenderBackend,
    typesetter: &'a dyn Typesetter,
}

impl<'a> Stage<'a> {
    pub fn new(
        canvas: Canvas,
        fps: Fps,
        backend: &'a mut dyn RenderBackend,
        typesetter: &'a dyn Typesetter,
    ) -> Self {
        Self {
            scene: Scene::new(canvas),
            scheduler: Scheduler::new(fps),
            backend,
            typesetter,
        }
    }

    pub fn typeset(&self, markup: &str) -> TrochiaResult<MathExpr> {
        self.typesetter.layout(markup)
    }

    pub fn typeset_at(&self, markup: &str, anchor: Point, scale: f64) -> TrochiaResult<MathExpr> {
        let mut expr = self.typesetter.layout(markup)?;
        expr.anchor = anchor;
        expr.scale = scale;
        Ok(expr)
    }

    pub fn play(&mut self, beat: Beat) -> TrochiaResult<BeatReport> {
        self.scheduler.run_beat(&mut self.scene, self.backend, beat)
    }

    pub fn play_all(&mut self, descriptors: Vec<AnimationDescriptor>) -> TrochiaResult<BeatReport> {
        self.play(Beat::new(descriptors)?)
    }

    pub fn play_instant(
        &mut self,
        descriptors: Vec<AnimationDescriptor>,
    ) -> TrochiaResult<BeatReport> {
        self.play(Beat::instant(descriptors)?)
    }

    pub fn wait(&mut self, secs: f64) -> TrochiaResult<BeatReport> {
        self.play(Beat::hold(secs)?)
    }
}

/// A canned presentation: a named beat sequence run against a fresh stage.
pub trait PresentationScript {
    fn name(&self) -> &'static str;

    fn canvas(&self) -> Canvas {
        Canvas {
            width: 14,
            height: 8,
        }
    }

    fn run(&self, stage: &mut Stage) -> TrochiaResult<()>;
}

pub fn script_names() -> Vec<&'static str> {
    vec![EpitrochoidDerivation.name()]
}

pub fn script_by_name(name: &str) -> Option<Box<dyn PresentationScript>> {
    match name {
        "epitrochoid" => Some(Box::new(EpitrochoidDerivation)),
        _ => None,
    }
}

/// Step-by-step derivation of the epitrochoid parametric equations from a
/// circle rolling without slipping on the outside of a fixed circle.
pub struct EpitrochoidDerivation;

const FIXED_R: f64 = 3.0;
const ROLLING_R: f64 = 1.0;
const PEN_D: f64 = 1.0;
const ROLL_FRACTION: f64 = 1.0 / 12.0;

/// After the measurement phase the whole diagram shrinks and slides left to
/// make room for the algebra on the right half of the canvas.
const SHRINK: f64 = 0.75;
const SHIFT: Vec2 = Vec2::new(-3.2, 0.0);

/// Geometry shared by every phase, all derived from the end-of-roll pose.
struct Layout {
    contact: RollingContact,
    theta: f64,
    alpha: f64,
    /// Rolling-circle center at end of roll, in pre-shrink coordinates.
    rolling_center: Point,
    /// Contact point on the fixed circle, in pre-shrink coordinates.
    contact_point: Point,
    /// Fixed and rolling centers after the shrink-and-shift.
    cf: Point,
    cr: Point,
}

impl Layout {
    fn new() -> TrochiaResult<Self> {
        let contact = RollingContact::new(FIXED_R, ROLLING_R, PEN_D)?;
        let pose = contact.advance(ROLL_FRACTION);
        let contact_point = Point::new(
            FIXED_R * pose.theta.cos(),
            FIXED_R * pose.theta.sin(),
        );
        let map = |p: Point| (p.to_vec2() * SHRINK + SHIFT).to_point();
        Ok(Self {
            contact,
            theta: pose.theta,
            alpha: pose.alpha,
            rolling_center: pose.center,
            contact_point,
            cf: map(Point::ZERO),
            cr: map(pose.center),
        })
    }

    fn map(&self, p: Point) -> Point {
        (p.to_vec2() * SHRINK + SHIFT).to_point()
    }
}

fn create(target: &str, secs: f64) -> AnimationDescriptor {
    AnimationDescriptor::new(target, UpdateOp::Create, secs)
}

fn fade_out(target: &str, secs: f64) -> AnimationDescriptor {
    AnimationDescriptor::new(target, UpdateOp::FadeTo { opacity: 0.0 }, secs)
}

struct ExprMetrics {
    anchor: Point,
    scale: f64,
    width: f64,
}

fn expr_metrics(scene: &Scene, name: &str) -> TrochiaResult<ExprMetrics> {
    let Some(Node::Expr { expr, .. }) = scene.find(name) else {
        return Err(TrochiaError::scene(format!(
            "'{name}' is not an expression in the scene"
        )));
    };
    Ok(ExprMetrics {
        anchor: expr.anchor,
        scale: expr.scale,
        width: expr.width(),
    })
}

impl PresentationScript for EpitrochoidDerivation {
    fn name(&self) -> &'static str {
        "epitrochoid"
    }

    fn run(&self, stage: &mut Stage) -> TrochiaResult<()> {
        tracing::info!(script = self.name(), "running presentation");
        let layout = Layout::new()?;
        self.roll_in(stage, &layout)?;
        self.measure(stage, &layout)?;
        self.shrink_and_state_relation(stage)?;
        self.decompose_horizontal(stage, &layout)?;
        self.decompose_vertical(stage, &layout)?;
        self.exterior_angle(stage, &layout)?;
        self.derive_tails(stage)?;
        self.pen_sweep(stage, &layout)?;
        self.box_the_result(stage)
    }
}

impl EpitrochoidDerivation {
    /// Draw both circles, then roll the small one a twelfth of a turn.
    fn roll_in(&self, stage: &mut Stage, layout: &Layout) -> TrochiaResult<()> {
        stage.scene.add(Node::Group(Group::new("diagram")))?;
        stage.scene.add_to("diagram", Node::Group(Group::new("rolling")))?;

        stage.scene.add_to(
            "diagram",
            Node::shape(
                "fixed_circle",
                Primitive::Circle(Circle::new(Point::ZERO, FIXED_R)?),
                Style::stroke(Rgba8::BLUE).reveal(0.0),
            ),
        )?;
        stage.play_all(vec![create("fixed_circle", 1.5)])?;

        stage.scene.add_to(
            "rolling",
            Node::shape(
                "rolling_circle",
                Primitive::Circle(Circle::new(layout.contact.start_center(), ROLLING_R)?),
                Style::default().reveal(0.0),
            ),
        )?;
        stage.play_all(vec![create("rolling_circle", 1.0)])?;

        stage.play_all(vec![
            AnimationDescriptor::new(
                "rolling",
                UpdateOp::Roll {
                    contact: layout.contact,
                    from_fraction: 0.0,
                    to_fraction: ROLL_FRACTION,
                },
                2.0,
            )
            .ease(Ease::Linear),
        ])?;
        Ok(())
    }

    /// Mark the traveled arcs, the radii and the two angles, then label them.
    fn measure(&self, stage: &mut Stage, layout: &Layout) -> TrochiaResult<()> {
        let cr = layout.rolling_center;

        stage.scene.add_to(
            "diagram",
            Node::shape(
                "fixed_arc",
                Primitive::Arc(Arc::new(Point::ZERO, FIXED_R, 0.0, layout.theta)?),
                Style::stroke(Rgba8::YELLOW).reveal(0.0),
            ),
        )?;
        stage.scene.add_to(
            "diagram",
            Node::shape(
                "rolling_arc",
                Primitive::Arc(Arc::new(cr, ROLLING_R, -FRAC_PI_6, -layout.alpha)?),
                Style::default().reveal(0.0),
            ),
        )?;
        stage.play_all(vec![create("fixed_arc", 1.0), create("rolling_arc", 1.0)])?;

        stage.scene.add_to(
            "diagram",
            Node::shape(
                "radius_fixed",
                Primitive::Segment(Segment::new(Point::ZERO, layout.contact_point)),
                Style::stroke(Rgba8::YELLOW).reveal(0.0),
            ),
        )?;
        stage.scene.add_to(
            "diagram",
            Node::shape(
                "radius_rolling",
                Primitive::Segment(Segment::new(cr, layout.contact_point)),
                Style::stroke(Rgba8::RED).reveal(0.0),
            ),
        )?;
        stage.play_all(vec![create("radius_fixed", 1.0), create("radius_rolling", 1.0)])?;

        let mid_fixed = Point::ZERO.midpoint(layout.contact_point);
        let mid_rolling = cr.midpoint(layout.contact_point);
        let label_fixed = stage.typeset_at(
            "R",
            mid_fixed + Vec2::new(-0.15, 0.35),
            0.75,
        )?;
        let label_rolling = stage.typeset_at(
            "r",
            mid_rolling + Vec2::new(0.1, 0.25),
            0.75,
        )?;
        stage.scene.add_to(
            "diagram",
            Node::expr("label_fixed_radius", label_fixed, Style::default().reveal(0.0)),
        )?;
        stage.scene.add_to(
            "diagram",
            Node::expr("label_rolling_radius", label_rolling, Style::default().reveal(0.0)),
        )?;
        stage.play_all(vec![
            create("label_fixed_radius", 1.0),
            create("label_rolling_radius", 1.0),
        ])?;

        stage.scene.add_to(
            "diagram",
            Node::shape(
                "theta_arc",
                Primitive::Arc(Arc::new(Point::ZERO, 0.5, 0.0, layout.theta)?),
                Style::default().reveal(0.0),
            ),
        )?;
        let label_theta = stage.typeset_at("\\theta", Point::new(0.55, -0.4), 0.75)?;
        stage.scene.add_to(
            "diagram",
            Node::expr("label_theta", label_theta, Style::default().reveal(0.0)),
        )?;
        stage.play_all(vec![create("theta_arc", 1.0), create("label_theta", 1.0)])?;

        stage.scene.add_to(
            "diagram",
            Node::shape(
                "alpha_arc",
                Primitive::Arc(Arc::new(cr, 0.3, -FRAC_PI_6, -layout.alpha)?),
                Style::default().reveal(0.0),
            ),
        )?;
        let label_alpha = stage.typeset_at("\\alpha", cr + Vec2::new(0.45, -0.5), 0.75)?;
        stage.scene.add_to(
            "diagram",
            Node::expr("label_alpha", label_alpha, Style::default().reveal(0.0)),
        )?;
        stage.play_all(vec![create("alpha_arc", 1.0), create("label_alpha", 1.0)])?;

        stage.wait(1.0)?;
        Ok(())
    }

    /// Shrink the diagram to the left and state the arc-length relation.
    fn shrink_and_state_relation(&self, stage: &mut Stage) -> TrochiaResult<()> {
        stage.play_all(vec![AnimationDescriptor::new(
            "diagram",
            UpdateOp::ScaleAbout {
                pivot: Point::ZERO,
                factor: SHRINK,
            },
            1.0,
        )])?;
        stage.play_all(vec![AnimationDescriptor::new(
            "diagram",
            UpdateOp::Shift { by: SHIFT },
            1.0,
        )])?;

        let relation = stage.typeset_at("R\\theta = r\\alpha", Point::new(2.4, 2.6), 0.75)?;
        stage
            .scene
            .add(Node::expr("relation", relation, Style::default().reveal(0.0)))?;
        stage.play_all(vec![create("relation", 1.0)])?;
        stage.wait(1.0)?;

        let derived = stage.typeset_at(
            "\\alpha = \\frac{R\\theta}{r}",
            Point::new(2.4, 2.0),
            0.75,
        )?;
        stage
            .scene
            .add(Node::expr("relation_solved", derived, Style::default().reveal(0.0)))?;
        stage.play_all(vec![create("relation_solved", 1.0)])?;
        stage.wait(1.0)?;
        Ok(())
    }

    /// Dashed triangle under the rolling center; read off (R+r)cos θ, with
    /// the R and r glyphs carried over from the diagram labels.
    fn decompose_horizontal(&self, stage: &mut Stage, layout: &Layout) -> TrochiaResult<()> {
        let tip = Point::new(layout.cr.x, layout.cf.y);
        stage.scene.add(Node::Group(Group::new("triangle")))?;
        stage.scene.add_to(
            "triangle",
            Node::shape(
                "triangle_run",
                Primitive::Segment(Segment::new(layout.cf, tip)),
                Style::default().dashed().reveal(0.0),
            ),
        )?;
        stage.scene.add_to(
            "triangle",
            Node::shape(
                "triangle_rise",
                Primitive::Segment(Segment::new(layout.cr, tip)),
                Style::default().dashed().reveal(0.0),
            ),
        )?;
        stage.play_all(vec![create("triangle", 1.0)])?;
        stage.wait(1.0)?;

        let rrcos = stage.typeset_at(
            "(R + r)\\cos(\\theta)",
            Point::new(layout.cf.x + 0.3, layout.cf.y - 0.45),
            0.5,
        )?;
        stage
            .scene
            .add(Node::expr("rrcos", rrcos, Style::default().reveal(0.0)))?;
        let (proxy_fixed, carry_fixed) =
            relocate_role(&mut stage.scene, "label_fixed_radius", "R", "rrcos", 1.0)?;
        let (proxy_rolling, carry_rolling) =
            relocate_role(&mut stage.scene, "label_rolling_radius", "r", "rrcos", 1.0)?;
        stage.play_all(vec![create("rrcos", 1.0), carry_fixed, carry_rolling])?;
        proxy_fixed.resolve(&mut stage.scene)?;
        proxy_rolling.resolve(&mut stage.scene)?;
        stage.wait(1.0)?;
        Ok(())
    }

    /// Same reading for the vertical leg: (R+r)sin θ.
    fn decompose_vertical(&self, stage: &mut Stage, layout: &Layout) -> TrochiaResult<()> {
        let rrsin = stage.typeset_at(
            "(R + r)\\sin(\\theta)",
            Point::new(layout.cr.x + 0.25, (layout.cf.y + layout.cr.y) / 2.0),
            0.5,
        )?;
        stage
            .scene
            .add(Node::expr("rrsin", rrsin, Style::default().reveal(0.0)))?;
        let (proxy_fixed, carry_fixed) =
            relocate_role(&mut stage.scene, "label_fixed_radius", "R", "rrsin", 1.0)?;
        let (proxy_rolling, carry_rolling) =
            relocate_role(&mut stage.scene, "label_rolling_radius", "r", "rrsin", 1.0)?;
        stage.play_all(vec![create("rrsin", 1.0), carry_fixed, carry_rolling])?;
        proxy_fixed.resolve(&mut stage.scene)?;
        proxy_rolling.resolve(&mut stage.scene)?;
        stage.wait(1.0)?;

        // Start the x/y equations and park both projections next to them.
        let x_eq = stage.typeset_at("x =", Point::new(1.2, 1.4), 0.75)?;
        let y_eq = stage.typeset_at("y =", Point::new(1.2, 0.5), 0.75)?;
        stage
            .scene
            .add(Node::expr("x_eq", x_eq, Style::default().reveal(0.0)))?;
        stage
            .scene
            .add(Node::expr("y_eq", y_eq, Style::default().reveal(0.0)))?;
        stage.play_all(vec![create("x_eq", 1.0), create("y_eq", 1.0)])?;
        stage.wait(1.0)?;

        let rrcos_anchor = expr_metrics(&stage.scene, "rrcos")?.anchor;
        let rrsin_anchor = expr_metrics(&stage.scene, "rrsin")?.anchor;
        stage.play_all(vec![
            AnimationDescriptor::new(
                "rrcos",
                UpdateOp::ScaleAbout {
                    pivot: rrcos_anchor,
                    factor: 1.5,
                },
                1.0,
            ),
            AnimationDescriptor::new(
                "rrsin",
                UpdateOp::ScaleAbout {
                    pivot: rrsin_anchor,
                    factor: 1.5,
                },
                1.0,
            ),
        ])?;
        stage.play_all(vec![
            AnimationDescriptor::new(
                "rrcos",
                UpdateOp::MoveTo {
                    to: Point::new(1.85, 1.4),
                },
                1.0,
            ),
            AnimationDescriptor::new(
                "rrsin",
                UpdateOp::MoveTo {
                    to: Point::new(1.85, 0.5),
                },
                1.0,
            ),
        ])?;
        stage.wait(1.0)?;
        stage.play_all(vec![fade_out("triangle", 0.5)])?;
        Ok(())
    }

    /// Swing a second radius to the pen position and measure the exterior
    /// angle π − θ − α at the rolling center.
    fn exterior_angle(&self, stage: &mut Stage, layout: &Layout) -> TrochiaResult<()> {
        let cr = layout.cr;
        stage.scene.add(Node::shape(
            "pen_radius",
            Primitive::Segment(Segment::new(cr, layout.map(layout.contact_point))),
            Style::stroke(Rgba8::RED),
        ))?;
        stage.play_all(vec![AnimationDescriptor::new(
            "pen_radius",
            UpdateOp::RotateAbout {
                pivot: cr,
                angle: 5.0 * PI / 6.0,
            },
            1.0,
        )])?;
        stage.play_all(vec![AnimationDescriptor::new(
            "label_rolling_radius",
            UpdateOp::MoveTo {
                to: cr + Vec2::new(ROLLING_R * SHRINK / 2.0, 0.2),
            },
            1.0,
        )])?;

        // Vertical counterpart of the dashed triangle.
        let tip = Point::new(layout.cf.x, cr.y);
        stage.scene.add(Node::Group(Group::new("triangle2")))?;
        stage.scene.add_to(
            "triangle2",
            Node::shape(
                "triangle2_rise",
                Primitive::Segment(Segment::new(layout.cf, tip)),
                Style::default().dashed().reveal(0.0),
            ),
        )?;
        stage.scene.add_to(
            "triangle2",
            Node::shape(
                "triangle2_run",
                Primitive::Segment(Segment::new(cr, tip)),
                Style::default().dashed().reveal(0.0),
            ),
        )?;
        stage.play_all(vec![create("triangle2", 1.0)])?;
        stage.wait(1.0)?;

        // The θ copy at the rolling center, replacing the contact radius.
        stage.scene.add(Node::shape(
            "theta_arc2",
            Primitive::Arc(Arc::new(
                cr,
                0.3 * SHRINK,
                -5.0 * PI / 6.0,
                -layout.theta,
            )?),
            Style::stroke(Rgba8::YELLOW).reveal(0.0),
        ))?;
        stage.play_all(vec![fade_out("radius_rolling", 1.0), create("theta_arc2", 1.0)])?;

        // The contact arc now spans θ + α.
        let alpha_metrics = expr_metrics(&stage.scene, "label_alpha")?;
        let combined = stage.typeset_at(
            "\\theta + \\alpha",
            alpha_metrics.anchor,
            alpha_metrics.scale,
        )?;
        stage.scene.add(Node::expr(
            "label_theta_alpha",
            combined,
            Style::default().opacity(0.0),
        ))?;
        stage.play_all(replace("label_alpha", "label_theta_alpha", 1.0).to_vec())?;
        stage.play_all(vec![AnimationDescriptor::new(
            "label_theta_alpha",
            UpdateOp::MoveTo {
                to: cr + Vec2::new(0.3, -0.55),
            },
            1.0,
        )])?;

        // Green elbow from the center down to the pen height.
        let edge = cr + Vec2::from_angle(-FRAC_PI_6) * (ROLLING_R * SHRINK);
        let edge_level = Point::new(edge.x, cr.y);
        stage.scene.add(Node::shape(
            "elbow_drop",
            Primitive::Segment(Segment::new(cr, edge)),
            Style::stroke(Rgba8::GREEN).reveal(0.0),
        ))?;
        stage.scene.add(Node::shape(
            "elbow_run",
            Primitive::Segment(Segment::new(edge, edge_level)),
            Style::stroke(Rgba8::GREEN).reveal(0.0),
        ))?;
        stage.play_all(vec![create("elbow_drop", 1.0), create("elbow_run", 1.0)])?;

        let ray_from = cr + Vec2::from_angle(-PI / 12.0) * 0.2;
        let ray_to = cr + Vec2::from_angle(FRAC_PI_3);
        stage.scene.add(Node::shape(
            "angle_ray",
            Primitive::Segment(Segment::new(ray_from, ray_to)),
            Style::default().width(1.0).reveal(0.0),
        ))?;
        stage.play_all(vec![create("angle_ray", 1.0)])?;

        let angle_text = stage.typeset_at(
            "\\pi - \\theta - \\alpha",
            ray_to + Vec2::new(0.05, 0.15),
            0.5,
        )?;
        stage
            .scene
            .add(Node::expr("angle_text", angle_text, Style::default().reveal(0.0)))?;
        stage.play_all(vec![create("angle_text", 1.0)])?;
        Ok(())
    }

    /// Append the pen terms to both equations and simplify them step by
    /// step, substituting α from the solved relation along the way.
    fn derive_tails(&self, stage: &mut Stage) -> TrochiaResult<()> {
        let rrcos = expr_metrics(&stage.scene, "rrcos")?;
        let rrsin = expr_metrics(&stage.scene, "rrsin")?;
        let x_tail = stage.typeset_at(
            "+\\, r\\cos\\left(\\pi - \\theta - \\alpha\\right)",
            rrcos.anchor + Vec2::new(rrcos.width + 0.1, 0.0),
            rrcos.scale,
        )?;
        let y_tail = stage.typeset_at(
            "-\\, r\\sin\\left(\\pi - \\theta - \\alpha\\right)",
            rrsin.anchor + Vec2::new(rrsin.width + 0.1, 0.0),
            rrsin.scale,
        )?;
        stage
            .scene
            .add(Node::expr("x_tail", x_tail, Style::default().reveal(0.0)))?;
        stage
            .scene
            .add(Node::expr("y_tail", y_tail, Style::default().reveal(0.0)))?;
        let (proxy_x, carry_x) =
            relocate_role(&mut stage.scene, "label_rolling_radius", "r", "x_tail", 1.0)?;
        let (proxy_y, carry_y) =
            relocate_role(&mut stage.scene, "label_rolling_radius", "r", "y_tail", 1.0)?;
        stage.play_all(vec![
            create("x_tail", 1.0),
            create("y_tail", 1.0),
            carry_x,
            carry_y,
        ])?;
        proxy_x.resolve(&mut stage.scene)?;
        proxy_y.resolve(&mut stage.scene)?;
        stage.wait(1.0)?;

        self.rewrite_tails(
            stage,
            "+\\, r\\cos\\left(\\theta + \\alpha - \\pi\\right)",
            "+\\, r\\sin\\left(\\theta + \\alpha - \\pi\\right)",
        )?;
        self.rewrite_tails(
            stage,
            "-\\, r\\cos\\left(\\theta + \\alpha\\right)",
            "-\\, r\\sin\\left(\\theta + \\alpha\\right)",
        )?;

        // Carry α over from the solved relation before substituting it out.
        let (proxy_x, carry_x) =
            relocate_role(&mut stage.scene, "relation_solved", "alpha", "x_tail", 1.0)?;
        let (proxy_y, carry_y) =
            relocate_role(&mut stage.scene, "relation_solved", "alpha", "y_tail", 1.0)?;
        stage.play_all(vec![carry_x, carry_y])?;
        proxy_x.resolve(&mut stage.scene)?;
        proxy_y.resolve(&mut stage.scene)?;
        stage.wait(1.0)?;

        self.rewrite_tails(
            stage,
            "-\\, r\\cos\\left(\\theta + \\frac{R\\theta}{r}\\right)",
            "-\\, r\\sin\\left(\\theta + \\frac{R\\theta}{r}\\right)",
        )?;
        self.rewrite_tails(
            stage,
            "-\\, r\\cos\\left(\\frac{R+r}{r}\\cdot\\theta\\right)",
            "-\\, r\\sin\\left(\\frac{R+r}{r}\\cdot\\theta\\right)",
        )?;

        // The construction has served its purpose.
        stage.play_all(
            [
                "elbow_drop",
                "elbow_run",
                "angle_ray",
                "angle_text",
                "label_theta_alpha",
                "theta_arc2",
                "triangle2",
                "pen_radius",
                "label_rolling_radius",
                "fixed_arc",
                "rolling_arc",
                "alpha_arc",
            ]
            .into_iter()
            .map(|name| fade_out(name, 1.0))
            .collect(),
        )?;
        Ok(())
    }

    fn rewrite_tails(
        &self,
        stage: &mut Stage,
        x_markup: &str,
        y_markup: &str,
    ) -> TrochiaResult<()> {
        let x = expr_metrics(&stage.scene, "x_tail")?;
        let y = expr_metrics(&stage.scene, "y_tail")?;
        let new_x = stage.typeset_at(x_markup, x.anchor, x.scale)?;
        let new_y = stage.typeset_at(y_markup, y.anchor, y.scale)?;
        let morph_x = matching_rewrite(&stage.scene, "x_tail", new_x, 1.0)?;
        let morph_y = matching_rewrite(&stage.scene, "y_tail", new_y, 1.0)?;
        stage.play_all(vec![morph_x, morph_y])?;
        stage.wait(0.5)?;
        Ok(())
    }

    /// Generalize the rim pen to an arbitrary offset d, sweeping it one full
    /// turn around the rolling center before substituting it in.
    fn pen_sweep(&self, stage: &mut Stage, layout: &Layout) -> TrochiaResult<()> {
        let cr = layout.cr;
        let reach = PEN_D * SHRINK;
        stage.scene.add(Node::shape(
            "pen_offset",
            Primitive::Segment(Segment::new(cr, cr + Vec2::new(reach, 0.0))),
            Style::default().reveal(0.0),
        ))?;
        stage.play_all(vec![create("pen_offset", 1.0)])?;

        let label_pen = stage.typeset_at("d", cr + Vec2::new(reach + 0.25, 0.0), 0.75)?;
        stage
            .scene
            .add(Node::expr("label_pen", label_pen, Style::default().reveal(0.0)))?;
        stage.play_all(vec![create("label_pen", 1.0)])?;

        stage.play_all(vec![
            AnimationDescriptor::new(
                "pen_offset",
                UpdateOp::RotateAbout {
                    pivot: cr,
                    angle: TAU,
                },
                4.0,
            )
            .ease(Ease::Linear),
        ])?;
        stage.play_all(vec![fade_out("pen_offset", 0.5)])?;

        self.rewrite_tails(
            stage,
            "-\\, d\\cos\\left(\\frac{R+r}{r}\\cdot\\theta\\right)",
            "-\\, d\\sin\\left(\\frac{R+r}{r}\\cdot\\theta\\right)",
        )?;
        stage.play_instant(vec![AnimationDescriptor::new(
            "label_pen",
            UpdateOp::FadeTo { opacity: 0.0 },
            0.0,
        )])?;
        Ok(())
    }

    /// Frame the finished pair of equations and hold.
    fn box_the_result(&self, stage: &mut Stage) -> TrochiaResult<()> {
        let x_eq = expr_metrics(&stage.scene, "x_eq")?;
        let y_eq = expr_metrics(&stage.scene, "y_eq")?;
        let x_tail = expr_metrics(&stage.scene, "x_tail")?;
        let y_tail = expr_metrics(&stage.scene, "y_tail")?;

        let left = x_eq.anchor.x.min(y_eq.anchor.x) - 0.3;
        let right = (x_tail.anchor.x + x_tail.width).max(y_tail.anchor.x + y_tail.width) + 0.3;
        let top = x_eq.anchor.y + 0.45;
        let bottom = y_eq.anchor.y - 0.45;

        stage.scene.add(Node::Group(Group::new("result_box")))?;
        let corners = [
            ("result_box_top", Point::new(left, top), Point::new(right, top)),
            ("result_box_right", Point::new(right, top), Point::new(right, bottom)),
            ("result_box_bottom", Point::new(right, bottom), Point::new(left, bottom)),
            ("result_box_left", Point::new(left, bottom), Point::new(left, top)),
        ];
        for (name, from, to) in corners {
            stage.scene.add_to(
                "result_box",
                Node::shape(
                    name,
                    Primitive::Segment(Segment::new(from, to)),
                    Style::default().reveal(0.0),
                ),
            )?;
        }
        stage.play_all(vec![create("result_box", 1.0)])?;
        stage.wait(3.0)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{expr::MonospaceTypesetter, render::NullBackend};

    #[test]
    fn registry_resolves_known_scripts() {
        assert!(script_names().contains(&"epitrochoid"));
        assert!(script_by_name("epitrochoid").is_some());
        assert!(script_by_name("nope").is_none());
    }

    #[test]
    fn typeset_at_places_the_expression() {
        let mut backend = NullBackend;
        let typesetter = MonospaceTypesetter::default();
        let stage = Stage::new(
            Canvas {
                width: 14,
                height: 8,
            },
            Fps::new(30, 1).unwrap(),
            &mut backend,
            &typesetter,
        );
        let e = stage
            .typeset_at("R\\theta", Point::new(2.0, -1.0), 0.5)
            .unwrap();
        assert_eq!(e.anchor, Point::new(2.0, -1.0));
        assert_eq!(e.scale, 0.5);
    }

    #[test]
    fn epitrochoid_runs_to_completion() {
        let script = EpitrochoidDerivation;
        let mut backend = NullBackend;
        let typesetter = MonospaceTypesetter::default();
        let mut stage = Stage::new(
            script.canvas(),
            Fps::new(5, 1).unwrap(),
            &mut backend,
            &typesetter,
        );
        script.run(&mut stage).unwrap();

        assert!(stage.scheduler.clock().0 > 0);
        assert!(stage.scene.contains("result_box"));

        // Both tails end on the d form of the pen term.
        let Some(Node::Expr { expr, .. }) = stage.scene.find("x_tail") else {
            panic!("x_tail missing")
        };
        assert_eq!(expr.markup, "-\\, d\\cos\\left(\\frac{R+r}{r}\\cdot\\theta\\right)");
        assert!(expr.groups.iter().any(|g| g.role.as_deref() == Some("d")));
    }

    #[test]
    fn roll_leaves_the_rolling_circle_on_the_solved_pose() {
        let script = EpitrochoidDerivation;
        let mut backend = NullBackend;
        let typesetter = MonospaceTypesetter::default();
        let mut stage = Stage::new(
            script.canvas(),
            Fps::new(5, 1).unwrap(),
            &mut backend,
            &typesetter,
        );
        let layout = Layout::new().unwrap();
        script.roll_in(&mut stage, &layout).unwrap();

        let Some(Node::Shape {
            primitive: Primitive::Circle(c),
            ..
        }) = stage.scene.find("rolling_circle")
        else {
            panic!("rolling_circle missing")
        };
        let expected = layout.contact.advance(ROLL_FRACTION);
        assert!((c.center - expected.center).hypot() < 1e-9);
        assert!((c.rotation - expected.self_rotation).abs() < 1e-9);
    }
}
