use std::collections::{BTreeMap, VecDeque};

use kurbo::Vec2;

use crate::{
    anim::{AnimationDescriptor, MorphPlan, UpdateOp},
    error::{TrochiaError, TrochiaResult},
    expr::{GlyphGroup, MathExpr},
    scene::{Node, Scene},
};

/// Handle to the throwaway glyph created by [`relocate_role`].
///
/// The proxy never mutates the source or destination expression; resolving it
/// removes the proxy node and reveals the destination's own glyph.
#[derive(Clone, Debug)]
pub struct RelocationProxy {
    proxy: String,
    dest: String,
    role: String,
}

impl RelocationProxy {
    pub fn node_name(&self) -> &str {
        &self.proxy
    }

    pub fn resolve(self, scene: &mut Scene) -> TrochiaResult<()> {
        scene.remove(&self.proxy)?;
        let Some(Node::Expr { expr, .. }) = scene.find_mut(&self.dest) else {
            return Err(TrochiaError::scene(format!(
                "relocation destination '{}' is not an expression",
                self.dest
            )));
        };
        expr.set_role_opacity(&self.role, 1.0)
    }
}

/// Carry the glyph for `role` visually from `source` to `dest`.
///
/// Clones the glyph into an ephemeral proxy node at the source anchor, hides
/// the destination's own glyph, and returns a move descriptor for the proxy.
/// Fails with `RoleNotFound` if either expression lacks the role; the caller
/// must then fall back to [`replace`] instead of skipping the visual.
pub fn relocate_role(
    scene: &mut Scene,
    source: &str,
    role: &str,
    dest: &str,
    duration_secs: f64,
) -> TrochiaResult<(RelocationProxy, AnimationDescriptor)> {
    let (glyph, src_anchor, src_scale, src_style) = {
        let Some(Node::Expr { expr, style, .. }) = scene.find(source) else {
            return Err(TrochiaError::scene(format!(
                "relocation source '{source}' is not an expression"
            )));
        };
        let idx = expr
            .group_index_of_role(role)
            .ok_or_else(|| TrochiaError::role_not_found(source, role))?;
        (
            expr.groups[idx].clone(),
            expr.abs_position(idx),
            expr.scale,
            *style,
        )
    };

    let dest_anchor = {
        let Some(Node::Expr { expr, .. }) = scene.find_mut(dest) else {
            return Err(TrochiaError::scene(format!(
                "relocation destination '{dest}' is not an expression"
            )));
        };
        let idx = expr
            .group_index_of_role(role)
            .ok_or_else(|| TrochiaError::role_not_found(dest, role))?;
        let anchor = expr.abs_position(idx);
        expr.set_role_opacity(role, 0.0)?;
        anchor
    };

    let proxy_name = unique_name(scene, &format!("{source}.{role}.proxy"));
    let proxy_expr = MathExpr {
        markup: glyph.text.clone(),
        groups: vec![GlyphGroup {
            offset: Vec2::ZERO,
            opacity: 1.0,
            ..glyph
        }],
        anchor: src_anchor,
        scale: src_scale,
        opacity: 1.0,
    };
    scene.add(Node::expr(proxy_name.clone(), proxy_expr, src_style))?;

    let descriptor =
        AnimationDescriptor::new(proxy_name.clone(), UpdateOp::MoveTo { to: dest_anchor }, duration_secs);
    Ok((
        RelocationProxy {
            proxy: proxy_name,
            dest: dest.to_string(),
            role: role.to_string(),
        },
        descriptor,
    ))
}

/// Morph the expression node `target` into `new_expr` by glyph matching.
///
/// Matching is on role keys (role tag, else glyph text) and is stable: ties
/// are broken by left-to-right reading order, never by textual similarity.
/// Matched groups interpolate position, unmatched old groups fade out and
/// unmatched new groups fade in; at commit the node holds `new_expr` exactly.
pub fn matching_rewrite(
    scene: &Scene,
    target: &str,
    new_expr: MathExpr,
    duration_secs: f64,
) -> TrochiaResult<AnimationDescriptor> {
    let Some(Node::Expr { expr, .. }) = scene.find(target) else {
        return Err(TrochiaError::scene(format!(
            "rewrite target '{target}' is not an expression"
        )));
    };
    let plan = stable_match(expr, new_expr);
    Ok(AnimationDescriptor::new(
        target,
        UpdateOp::Morph(plan),
        duration_secs,
    ))
}

/// Full replacement: fade `old` out while fading `new` in at its own anchor.
///
/// Used whenever partial matching is inapplicable or would read badly. The
/// `new` node must already be in the scene (usually at opacity 0).
pub fn replace(old: &str, new: &str, duration_secs: f64) -> [AnimationDescriptor; 2] {
    [
        AnimationDescriptor::new(old, UpdateOp::FadeTo { opacity: 0.0 }, duration_secs),
        AnimationDescriptor::new(new, UpdateOp::FadeTo { opacity: 1.0 }, duration_secs),
    ]
}

fn unique_name(scene: &Scene, base: &str) -> String {
    if !scene.contains(base) {
        return base.to_string();
    }
    let mut n = 2usize;
    loop {
        let candidate = format!("{base}.{n}");
        if !scene.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn role_key(g: &GlyphGroup) -> &str {
    g.role.as_deref().unwrap_or(&g.text)
}

fn stable_match(old: &MathExpr, new_expr: MathExpr) -> MorphPlan {
    let mut by_key: BTreeMap<&str, VecDeque<usize>> = BTreeMap::new();
    for (i, g) in old.groups.iter().enumerate() {
        by_key.entry(role_key(g)).or_default().push_back(i);
    }

    let mut pairs = Vec::new();
    let mut fade_in = Vec::new();
    let mut used = vec![false; old.groups.len()];
    for (j, g) in new_expr.groups.iter().enumerate() {
        match by_key.get_mut(role_key(g)).and_then(VecDeque::pop_front) {
            Some(i) => {
                used[i] = true;
                pairs.push((i, j));
            }
            None => fade_in.push(j),
        }
    }
    let fade_out = used
        .iter()
        .enumerate()
        .filter(|(_, u)| !**u)
        .map(|(i, _)| i)
        .collect();

    MorphPlan {
        new_expr,
        pairs,
        fade_out,
        fade_in,
    }
}
