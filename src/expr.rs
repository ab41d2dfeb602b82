use kurbo::{Point, Vec2};

use crate::error::{TrochiaError, TrochiaResult};

/// A typeset math expression: an ordered run of addressable glyph-groups.
///
/// Groups are stored in reading order with offsets relative to `anchor`.
/// A group may carry a stable role tag ("theta", "R", ...) which is what the
/// rewrite machinery matches on; two expressions sharing roles can be
/// partially morphed, otherwise a rewrite is a full replacement.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MathExpr {
    pub markup: String,
    pub groups: Vec<GlyphGroup>,
    pub anchor: Point,
    pub scale: f64,
    pub opacity: f64,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GlyphGroup {
    pub text: String,
    pub role: Option<String>,
    /// Offset from the expression anchor, in unscaled layout units.
    pub offset: Vec2,
    pub advance: f64,
    pub opacity: f64,
}

impl MathExpr {
    pub fn group_index_of_role(&self, role: &str) -> Option<usize> {
        self.groups
            .iter()
            .position(|g| g.role.as_deref() == Some(role))
    }

    /// Absolute position of glyph-group `index`.
    pub fn abs_position(&self, index: usize) -> Point {
        self.anchor + self.groups[index].offset * self.scale
    }

    pub fn anchor_of_role(&self, role: &str) -> TrochiaResult<Point> {
        let idx = self
            .group_index_of_role(role)
            .ok_or_else(|| TrochiaError::role_not_found(self.markup.clone(), role))?;
        Ok(self.abs_position(idx))
    }

    pub fn anchor_of_index(&self, index: usize) -> TrochiaResult<Point> {
        if index >= self.groups.len() {
            return Err(TrochiaError::scene(format!(
                "glyph-group index {index} out of bounds for '{}'",
                self.markup
            )));
        }
        Ok(self.abs_position(index))
    }

    /// Set the opacity of every group tagged `role`.
    pub fn set_role_opacity(&mut self, role: &str, opacity: f64) -> TrochiaResult<()> {
        let mut found = false;
        for g in &mut self.groups {
            if g.role.as_deref() == Some(role) {
                g.opacity = opacity.clamp(0.0, 1.0);
                found = true;
            }
        }
        if !found {
            return Err(TrochiaError::role_not_found(self.markup.clone(), role));
        }
        Ok(())
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.anchor += delta;
    }

    pub fn move_to(&mut self, anchor: Point) {
        self.anchor = anchor;
    }

    pub fn scale_about(&mut self, pivot: Point, factor: f64) {
        self.anchor = pivot + (self.anchor - pivot) * factor;
        self.scale *= factor;
    }

    /// Total layout width in scaled units.
    pub fn width(&self) -> f64 {
        self.groups
            .last()
            .map(|g| (g.offset.x + g.advance) * self.scale)
            .unwrap_or(0.0)
    }
}

/// External typesetting service: markup string in, glyph-group tree out.
pub trait Typesetter {
    fn layout(&self, markup: &str) -> TrochiaResult<MathExpr>;
}

/// Deterministic built-in layouter with a fixed advance per glyph.
///
/// Understands the small markup subset the shipped scripts use: greek
/// commands, `\cos`/`\sin`, `\cdot`, `\frac{..}{..}` (kept as one group),
/// `\left`/`\right`/`\,` (layout no-ops), single symbols, digits and
/// punctuation. Bare single-letter symbols and greek letters are auto-tagged
/// with their own name as role.
#[derive(Clone, Copy, Debug)]
pub struct MonospaceTypesetter {
    pub glyph_advance: f64,
}

impl Default for MonospaceTypesetter {
    fn default() -> Self {
        Self { glyph_advance: 0.3 }
    }
}

impl Typesetter for MonospaceTypesetter {
    fn layout(&self, markup: &str) -> TrochiaResult<MathExpr> {
        let tokens = tokenize(markup)?;
        let mut groups = Vec::with_capacity(tokens.len());
        let mut x = 0.0;
        for (text, role) in tokens {
            let advance = self.glyph_advance * text.chars().count() as f64;
            groups.push(GlyphGroup {
                text,
                role,
                offset: Vec2::new(x, 0.0),
                advance,
                opacity: 1.0,
            });
            x += advance;
        }
        Ok(MathExpr {
            markup: markup.to_string(),
            groups,
            anchor: Point::ZERO,
            scale: 1.0,
            opacity: 1.0,
        })
    }
}

fn tokenize(markup: &str) -> TrochiaResult<Vec<(String, Option<String>)>> {
    let chars: Vec<char> = markup.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '\\' => {
                i += 1;
                if i < chars.len() && chars[i] == ',' {
                    // thin space
                    i += 1;
                    continue;
                }
                let start = i;
                while i < chars.len() && chars[i].is_ascii_alphabetic() {
                    i += 1;
                }
                let cmd: String = chars[start..i].iter().collect();
                match cmd.as_str() {
                    "left" | "right" => {} // the delimiter follows as a plain char
                    "theta" => out.push(("θ".to_string(), Some("theta".to_string()))),
                    "alpha" => out.push(("α".to_string(), Some("alpha".to_string()))),
                    "pi" => out.push(("π".to_string(), Some("pi".to_string()))),
                    "cos" | "sin" => out.push((cmd, None)),
                    "cdot" => out.push(("·".to_string(), None)),
                    "frac" => {
                        let (num, after_num) = read_brace_group(&chars, i)?;
                        let (den, after_den) = read_brace_group(&chars, after_num)?;
                        i = after_den;
                        let num_txt = flatten(&num)?;
                        let den_txt = flatten(&den)?;
                        out.push((format!("{num_txt}/{den_txt}"), None));
                    }
                    "" => {
                        return Err(TrochiaError::configuration(
                            "dangling backslash in markup",
                        ));
                    }
                    other => {
                        return Err(TrochiaError::configuration(format!(
                            "unknown markup command '\\{other}'"
                        )));
                    }
                }
            }
            '{' | '}' => i += 1,
            c if c.is_ascii_alphabetic() => {
                out.push((c.to_string(), Some(c.to_string())));
                i += 1;
            }
            c if c.is_ascii_digit() => {
                out.push((c.to_string(), None));
                i += 1;
            }
            '(' | ')' | '+' | '-' | '=' | '·' | '/' | '.' | ',' => {
                out.push((c.to_string(), None));
                i += 1;
            }
            other => {
                return Err(TrochiaError::configuration(format!(
                    "unsupported markup character '{other}'"
                )));
            }
        }
    }
    Ok(out)
}

/// Read a `{...}` group starting at `chars[at]`, returning the inner text and
/// the index just past the closing brace.
fn read_brace_group(chars: &[char], at: usize) -> TrochiaResult<(String, usize)> {
    if at >= chars.len() || chars[at] != '{' {
        return Err(TrochiaError::configuration(
            "expected '{' after \\frac in markup",
        ));
    }
    let mut depth = 1usize;
    let mut i = at + 1;
    let start = i;
    while i < chars.len() {
        match chars[i] {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let inner: String = chars[start..i].iter().collect();
                    return Ok((inner, i + 1));
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err(TrochiaError::configuration("unbalanced braces in markup"))
}

fn flatten(inner: &str) -> TrochiaResult<String> {
    Ok(tokenize(inner)?
        .into_iter()
        .map(|(text, _)| text)
        .collect::<Vec<_>>()
        .join(""))
}
