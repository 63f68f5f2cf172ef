//! Transform, opacity and clip stacks for one composite pass.
//!
//! Nodes are laid out relative to their parent's border box; the context
//! accumulates those offsets (and any style transforms) into a device matrix
//! as the compositor descends, and restores the previous state on `pop`.

use engine_core::{ColorLinPremul, ImageFilter, Rect, RenderSink, TextureHandle, Transform2D};

#[derive(Debug, Clone, Copy)]
struct State {
    matrix: Transform2D,
    opacity: f32,
    clip: Option<Rect>,
}

pub struct CompositeContext<'a> {
    sink: &'a mut dyn RenderSink,
    current: State,
    stack: Vec<State>,
    /// Clip last sent to the sink, to avoid redundant `set_clip` calls.
    applied_clip: Option<Rect>,
}

impl<'a> CompositeContext<'a> {
    pub fn new(sink: &'a mut dyn RenderSink) -> Self {
        Self {
            sink,
            current: State {
                matrix: Transform2D::identity(),
                opacity: 1.0,
                clip: None,
            },
            stack: Vec::new(),
            applied_clip: None,
        }
    }

    /// Enter a node: `local` maps node space into the parent's space.
    pub fn push(&mut self, local: Transform2D, opacity: f32) {
        self.stack.push(self.current);
        self.current.matrix = self.current.matrix.concat(local);
        self.current.opacity *= opacity.clamp(0.0, 1.0);
    }

    /// Intersect the clip with `rect` given in current node space.
    pub fn push_clip(&mut self, rect: Rect) {
        self.stack.push(self.current);
        let device = self.current.matrix.map_rect_bounds(rect);
        self.current.clip = Some(match self.current.clip {
            Some(clip) => clip.intersect(&device),
            None => device,
        });
    }

    pub fn pop(&mut self) {
        match self.stack.pop() {
            Some(prev) => self.current = prev,
            None => tracing::warn!("CompositeContext::pop with empty stack"),
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn matrix(&self) -> Transform2D {
        self.current.matrix
    }

    pub fn opacity(&self) -> f32 {
        self.current.opacity
    }

    pub fn clip(&self) -> Option<Rect> {
        self.current.clip
    }

    /// Whether everything drawn now would be invisible.
    pub fn is_culled(&self) -> bool {
        self.current.opacity <= 0.0 || self.current.clip.is_some_and(|c| c.is_empty())
    }

    pub fn sink(&mut self) -> &mut dyn RenderSink {
        self.sync_clip();
        &mut *self.sink
    }

    fn sync_clip(&mut self) {
        if self.applied_clip != self.current.clip {
            self.sink.set_clip(self.current.clip);
            self.applied_clip = self.current.clip;
        }
    }

    pub fn fill_rect(&mut self, rect: Rect, color: ColorLinPremul) {
        let color = color.with_opacity(self.current.opacity);
        if color.is_transparent() || rect.is_empty() {
            return;
        }
        self.sync_clip();
        self.sink.fill_rect(&self.current.matrix, rect, color);
    }

    pub fn stroke_rect(&mut self, rect: Rect, width: f32, color: ColorLinPremul) {
        let color = color.with_opacity(self.current.opacity);
        if color.is_transparent() || width <= 0.0 {
            return;
        }
        self.sync_clip();
        self.sink.stroke_rect(&self.current.matrix, rect, width, color);
    }

    pub fn draw_image(&mut self, src: Rect, dest: Rect, texture: TextureHandle) {
        if dest.is_empty() || self.current.opacity <= 0.0 {
            return;
        }
        self.sync_clip();
        self.sink.draw_image(
            &self.current.matrix,
            src,
            dest,
            texture,
            ImageFilter::Linear,
            self.current.opacity,
        );
    }

    /// Reset the clip and present the frame.
    pub fn finish(mut self) {
        if self.applied_clip.is_some() {
            self.sink.set_clip(None);
        }
        self.sink.present();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::{DrawCall, RecordingSink};

    #[test]
    fn push_accumulates_and_pop_restores() {
        let mut sink = RecordingSink::new();
        let mut ctx = CompositeContext::new(&mut sink);
        ctx.push(Transform2D::translate(10.0, 5.0), 0.5);
        ctx.push(Transform2D::translate(1.0, 1.0), 0.5);
        assert_eq!(ctx.matrix().apply([0.0, 0.0]), [11.0, 6.0]);
        assert_eq!(ctx.opacity(), 0.25);
        ctx.pop();
        assert_eq!(ctx.matrix().apply([0.0, 0.0]), [10.0, 5.0]);
        ctx.pop();
        assert_eq!(ctx.depth(), 0);
        assert!(ctx.matrix().is_identity());
    }

    #[test]
    fn clips_intersect_in_device_space_and_are_sent_lazily() {
        let mut sink = RecordingSink::new();
        {
            let mut ctx = CompositeContext::new(&mut sink);
            ctx.push(Transform2D::translate(10.0, 10.0), 1.0);
            ctx.push_clip(Rect::new(0.0, 0.0, 50.0, 50.0));
            ctx.push_clip(Rect::new(20.0, 20.0, 100.0, 100.0));
            assert_eq!(ctx.clip(), Some(Rect::new(30.0, 30.0, 30.0, 30.0)));
            ctx.fill_rect(Rect::new(0.0, 0.0, 5.0, 5.0), ColorLinPremul::rgba(255, 0, 0, 255));
            ctx.fill_rect(Rect::new(0.0, 0.0, 5.0, 5.0), ColorLinPremul::rgba(255, 0, 0, 255));
            ctx.pop();
            ctx.pop();
            ctx.pop();
            ctx.finish();
        }
        let cmds = &sink.display_list().commands;
        assert!(matches!(cmds[0], DrawCall::SetClip(Some(_))));
        assert!(matches!(cmds[1], DrawCall::FillRect { .. }));
        assert!(matches!(cmds[2], DrawCall::FillRect { .. }));
        assert_eq!(cmds[3], DrawCall::SetClip(None));
        assert_eq!(cmds[4], DrawCall::Present);
    }

    #[test]
    fn transparent_draws_are_dropped() {
        let mut sink = RecordingSink::new();
        {
            let mut ctx = CompositeContext::new(&mut sink);
            ctx.push(Transform2D::identity(), 0.0);
            assert!(ctx.is_culled());
            ctx.fill_rect(Rect::new(0.0, 0.0, 5.0, 5.0), ColorLinPremul::rgba(0, 0, 0, 255));
            ctx.pop();
            ctx.fill_rect(Rect::new(0.0, 0.0, 5.0, 5.0), ColorLinPremul::TRANSPARENT);
        }
        assert_eq!(sink.display_list().draws().count(), 0);
    }
}
