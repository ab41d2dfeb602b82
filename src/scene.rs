use kurbo::{Point, Vec2};

use crate::{
    core::{Canvas, Style},
    error::{TrochiaError, TrochiaResult},
    expr::MathExpr,
    primitive::Primitive,
    render::RenderBackend,
};

/// The scene graph: a tree of uniquely named nodes under one root group.
///
/// Ownership is exclusive, so grouping is a tree by construction and no
/// composite can contain itself. Removal is explicit; the presentation
/// convention is to fade to zero opacity instead.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Scene {
    pub canvas: Canvas,
    pub root: Group,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Group {
    pub name: String,
    pub children: Vec<Node>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum Node {
    Shape {
        name: String,
        primitive: Primitive,
        style: Style,
    },
    Expr {
        name: String,
        expr: MathExpr,
        style: Style,
    },
    Group(Group),
}

impl Node {
    pub fn shape(name: impl Into<String>, primitive: Primitive, style: Style) -> Self {
        Self::Shape {
            name: name.into(),
            primitive,
            style,
        }
    }

    pub fn expr(name: impl Into<String>, expr: MathExpr, style: Style) -> Self {
        Self::Expr {
            name: name.into(),
            expr,
            style,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Shape { name, .. } | Self::Expr { name, .. } => name,
            Self::Group(g) => &g.name,
        }
    }

    /// Representative point for move targets: leaf anchor, or the mean of
    /// leaf anchors for a group.
    pub fn anchor(&self) -> Point {
        let mut anchors = Vec::new();
        self.leaf_anchors(&mut anchors);
        if anchors.is_empty() {
            return Point::ZERO;
        }
        let sum = anchors
            .iter()
            .fold(Vec2::ZERO, |acc, p| acc + p.to_vec2());
        (sum / anchors.len() as f64).to_point()
    }

    fn leaf_anchors(&self, out: &mut Vec<Point>) {
        match self {
            Self::Shape { primitive, .. } => out.push(primitive.anchor()),
            Self::Expr { expr, .. } => out.push(expr.anchor),
            Self::Group(g) => {
                for child in &g.children {
                    child.leaf_anchors(out);
                }
            }
        }
    }

    pub fn translate(&mut self, delta: Vec2) {
        match self {
            Self::Shape { primitive, .. } => primitive.translate(delta),
            Self::Expr { expr, .. } => expr.translate(delta),
            Self::Group(g) => {
                for child in &mut g.children {
                    child.translate(delta);
                }
            }
        }
    }

    pub fn rotate_about(&mut self, pivot: Point, angle: f64) {
        match self {
            Self::Shape { primitive, .. } => primitive.rotate_about(pivot, angle),
            Self::Expr { expr, .. } => {
                // Glyph offsets are not rotated; labels stay upright.
                let v = expr.anchor - pivot;
                let (sin, cos) = angle.sin_cos();
                expr.anchor = pivot + Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos);
            }
            Self::Group(g) => {
                for child in &mut g.children {
                    child.rotate_about(pivot, angle);
                }
            }
        }
    }

    /// Uniform scale of every leaf toward a shared pivot, preserving the
    /// relative layout of the subtree.
    pub fn scale_about(&mut self, pivot: Point, factor: f64) {
        match self {
            Self::Shape { primitive, .. } => primitive.scale_about(pivot, factor),
            Self::Expr { expr, .. } => expr.scale_about(pivot, factor),
            Self::Group(g) => {
                for child in &mut g.children {
                    child.scale_about(pivot, factor);
                }
            }
        }
    }

    pub fn set_opacity(&mut self, opacity: f64) {
        let opacity = opacity.clamp(0.0, 1.0);
        match self {
            Self::Shape { style, .. } | Self::Expr { style, .. } => style.opacity = opacity,
            Self::Group(g) => {
                for child in &mut g.children {
                    child.set_opacity(opacity);
                }
            }
        }
    }

    /// Move every leaf's opacity a fraction `t` of the way toward `to`.
    pub fn fade_toward(&mut self, to: f64, t: f64) {
        match self {
            Self::Shape { style, .. } | Self::Expr { style, .. } => {
                style.opacity = (style.opacity + (to - style.opacity) * t).clamp(0.0, 1.0);
            }
            Self::Group(g) => {
                for child in &mut g.children {
                    child.fade_toward(to, t);
                }
            }
        }
    }

    pub fn set_reveal(&mut self, reveal: f64) {
        let reveal = reveal.clamp(0.0, 1.0);
        match self {
            Self::Shape { style, .. } | Self::Expr { style, .. } => style.reveal = reveal,
            Self::Group(g) => {
                for child in &mut g.children {
                    child.set_reveal(reveal);
                }
            }
        }
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        out.push(self.name());
        if let Self::Group(g) = self {
            for child in &g.children {
                child.collect_names(out);
            }
        }
    }
}

impl Scene {
    pub fn new(canvas: Canvas) -> Self {
        Self {
            canvas,
            root: Group::new("root"),
        }
    }

    /// Add a node at the root. Names must be unique scene-wide.
    pub fn add(&mut self, node: Node) -> TrochiaResult<()> {
        self.check_new_names(&node)?;
        self.root.children.push(node);
        Ok(())
    }

    /// Add a node inside an existing group.
    pub fn add_to(&mut self, group: &str, node: Node) -> TrochiaResult<()> {
        self.check_new_names(&node)?;
        let Some(Node::Group(g)) = find_in(&mut self.root, group) else {
            return Err(TrochiaError::scene(format!(
                "no group named '{group}' in scene"
            )));
        };
        g.children.push(node);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn find(&self, name: &str) -> Option<&Node> {
        find_ref_in(&self.root, name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Node> {
        find_in(&mut self.root, name)
    }

    /// Explicitly remove a node. Most scripts should fade instead.
    pub fn remove(&mut self, name: &str) -> TrochiaResult<Node> {
        remove_in(&mut self.root, name)
            .ok_or_else(|| TrochiaError::scene(format!("no node named '{name}' to remove")))
    }

    /// Draw every visible leaf in insertion order.
    pub fn render(&self, backend: &mut dyn RenderBackend) -> TrochiaResult<()> {
        backend.begin_frame(self.canvas)?;
        render_group(&self.root, backend)?;
        backend.present_frame()
    }

    fn check_new_names(&self, node: &Node) -> TrochiaResult<()> {
        let mut names = Vec::new();
        node.collect_names(&mut names);
        for name in names {
            if name == self.root.name || self.contains(name) {
                return Err(TrochiaError::scene(format!(
                    "duplicate node name '{name}' in scene"
                )));
            }
        }
        Ok(())
    }
}

fn render_group(group: &Group, backend: &mut dyn RenderBackend) -> TrochiaResult<()> {
    for child in &group.children {
        match child {
            Node::Shape {
                primitive, style, ..
            } => {
                if style.opacity > 0.0 {
                    backend.draw_primitive(primitive, style)?;
                }
            }
            Node::Expr { expr, style, .. } => {
                if style.opacity > 0.0 && expr.opacity > 0.0 {
                    backend.draw_expr(expr, style)?;
                }
            }
            Node::Group(g) => render_group(g, backend)?,
        }
    }
    Ok(())
}

fn find_in<'a>(group: &'a mut Group, name: &str) -> Option<&'a mut Node> {
    for child in &mut group.children {
        if child.name() == name {
            return Some(child);
        }
        if let Node::Group(g) = child
            && let Some(found) = find_in(g, name)
        {
            return Some(found);
        }
    }
    None
}

fn find_ref_in<'a>(group: &'a Group, name: &str) -> Option<&'a Node> {
    for child in &group.children {
        if child.name() == name {
            return Some(child);
        }
        if let Node::Group(g) = child
            && let Some(found) = find_ref_in(g, name)
        {
            return Some(found);
        }
    }
    None
}

fn remove_in(group: &mut Group, name: &str) -> Option<Node> {
    if let Some(idx) = group.children.iter().position(|c| c.name() == name) {
        return Some(group.children.remove(idx));
    }
    for child in &mut group.children {
        if let Node::Group(g) = child
            && let Some(node) = remove_in(g, name)
        {
            return Some(node);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::Rgba8,
        primitive::{Circle, Dot},
    };

    fn scene() -> Scene {
        Scene::new(Canvas {
            width: 14,
            height: 8,
        })
    }

    fn dot(name: &str, x: f64, y: f64) -> Node {
        Node::shape(
            name,
            Primitive::Dot(Dot::new(Point::new(x, y))),
            Style::default(),
        )
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut s = scene();
        s.add(dot("a", 0.0, 0.0)).unwrap();
        assert!(s.add(dot("a", 1.0, 0.0)).is_err());

        let mut g = Group::new("g");
        g.children.push(dot("a", 0.0, 0.0));
        assert!(s.add(Node::Group(g)).is_err());
    }

    #[test]
    fn add_to_requires_an_existing_group() {
        let mut s = scene();
        assert!(s.add_to("missing", dot("a", 0.0, 0.0)).is_err());
        s.add(Node::Group(Group::new("g"))).unwrap();
        s.add_to("g", dot("a", 0.0, 0.0)).unwrap();
        assert!(s.find("a").is_some());
    }

    #[test]
    fn group_scale_preserves_relative_layout() {
        let mut s = scene();
        s.add(Node::Group(Group::new("g"))).unwrap();
        s.add_to("g", dot("a", 2.0, 0.0)).unwrap();
        s.add_to("g", dot("b", 4.0, 0.0)).unwrap();

        s.find_mut("g").unwrap().scale_about(Point::ZERO, 0.5);
        assert_eq!(s.find("a").unwrap().anchor(), Point::new(1.0, 0.0));
        assert_eq!(s.find("b").unwrap().anchor(), Point::new(2.0, 0.0));
    }

    #[test]
    fn group_anchor_is_mean_of_leaves() {
        let mut s = scene();
        s.add(Node::Group(Group::new("g"))).unwrap();
        s.add_to("g", dot("a", 0.0, 0.0)).unwrap();
        s.add_to("g", dot("b", 2.0, 4.0)).unwrap();
        assert_eq!(s.find("g").unwrap().anchor(), Point::new(1.0, 2.0));
    }

    #[test]
    fn fade_cascades_to_leaves() {
        let mut s = scene();
        s.add(Node::Group(Group::new("g"))).unwrap();
        s.add_to(
            "g",
            Node::shape(
                "c",
                Primitive::Circle(Circle::new(Point::ZERO, 1.0).unwrap()),
                Style::stroke(Rgba8::BLUE),
            ),
        )
        .unwrap();

        s.find_mut("g").unwrap().fade_toward(0.0, 0.5);
        let Node::Shape { style, .. } = s.find("c").unwrap() else {
            unreachable!()
        };
        assert_eq!(style.opacity, 0.5);
    }

    #[test]
    fn remove_returns_the_node() {
        let mut s = scene();
        s.add(dot("a", 1.0, 1.0)).unwrap();
        let node = s.remove("a").unwrap();
        assert_eq!(node.name(), "a");
        assert!(!s.contains("a"));
        assert!(s.remove("a").is_err());
    }

    #[test]
    fn json_roundtrip() {
        let mut s = scene();
        s.add(dot("a", 1.0, 2.0)).unwrap();
        let json = serde_json::to_string(&s).unwrap();
        let de: Scene = serde_json::from_str(&json).unwrap();
        assert_eq!(de.find("a").unwrap().anchor(), Point::new(1.0, 2.0));
    }
}
