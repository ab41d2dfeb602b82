use crate::{
    core::{Canvas, Style},
    error::TrochiaResult,
    expr::MathExpr,
    primitive::Primitive,
};

/// Rendering backend interface consumed by the scene walk.
///
/// The engine only issues draw calls; turning them into pixels or video is an
/// external concern. Backends must be deterministic for identical call
/// streams.
pub trait RenderBackend {
    fn begin_frame(&mut self, canvas: Canvas) -> TrochiaResult<()>;
    fn draw_primitive(&mut self, primitive: &Primitive, style: &Style) -> TrochiaResult<()>;
    fn draw_expr(&mut self, expr: &MathExpr, style: &Style) -> TrochiaResult<()>;
    fn present_frame(&mut self) -> TrochiaResult<()>;
}

/// Discards every draw call.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullBackend;

impl RenderBackend for NullBackend {
    fn begin_frame(&mut self, _canvas: Canvas) -> TrochiaResult<()> {
        Ok(())
    }

    fn draw_primitive(&mut self, _primitive: &Primitive, _style: &Style) -> TrochiaResult<()> {
        Ok(())
    }

    fn draw_expr(&mut self, _expr: &MathExpr, _style: &Style) -> TrochiaResult<()> {
        Ok(())
    }

    fn present_frame(&mut self) -> TrochiaResult<()> {
        Ok(())
    }
}

/// Records the full draw-call stream; used by tests and `--stats`.
#[derive(Clone, Debug, Default)]
pub struct RecordingBackend {
    pub frames_presented: u64,
    pub calls: Vec<DrawCall>,
}

#[derive(Clone, Debug, serde::Serialize)]
pub enum DrawCall {
    Begin { canvas: Canvas },
    Primitive { primitive: Primitive, style: Style },
    Expr { expr: MathExpr, style: Style },
    Present,
}

impl RenderBackend for RecordingBackend {
    fn begin_frame(&mut self, canvas: Canvas) -> TrochiaResult<()> {
        self.calls.push(DrawCall::Begin { canvas });
        Ok(())
    }

    fn draw_primitive(&mut self, primitive: &Primitive, style: &Style) -> TrochiaResult<()> {
        self.calls.push(DrawCall::Primitive {
            primitive: primitive.clone(),
            style: *style,
        });
        Ok(())
    }

    fn draw_expr(&mut self, expr: &MathExpr, style: &Style) -> TrochiaResult<()> {
        self.calls.push(DrawCall::Expr {
            expr: expr.clone(),
            style: *style,
        });
        Ok(())
    }

    fn present_frame(&mut self) -> TrochiaResult<()> {
        self.calls.push(DrawCall::Present);
        self.frames_presented += 1;
        Ok(())
    }
}
