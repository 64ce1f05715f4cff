//! Turns camera and viewport changes into pixel-scale change events.

use std::cell::Cell;
use std::rc::Rc;

use crate::event::{Event, Subscription};
use crate::render::{CameraProjection, RenderContext};

/// Watches one render context and fires `event_pixel_scale_change` when
/// `space_height_at_target / (zoom * screen_height)` may have changed.
#[derive(Debug, Default)]
pub struct PixelScaleWatcher {
    pub event_pixel_scale_change: Event<f64>,
    /// Last seen triple; `None` while unattached.
    memo: Rc<Cell<Option<CameraProjection>>>,
    subscriptions: Vec<Subscription>,
}

impl PixelScaleWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach to `context`, or detach with `None`. Listeners on the previous
    /// context are removed first; attaching evaluates once immediately.
    pub fn set_context(&mut self, context: Option<&RenderContext>) {
        for sub in self.subscriptions.drain(..) {
            sub.detach();
        }
        self.memo.set(None);
        let Some(context) = context else {
            return;
        };

        let on_resize = self.listener();
        let on_transform = self.listener();
        self.subscriptions.push(context.event_resize.subscribe(on_resize));
        self.subscriptions.push(
            context
                .camera()
                .event_transform_change
                .subscribe(on_transform),
        );

        let mut evaluate = self.listener();
        evaluate(&context.camera().projection());
    }

    pub fn is_attached(&self) -> bool {
        !self.subscriptions.is_empty()
    }

    /// World units per pixel; 1 while unattached.
    pub fn pixel_scale(&self) -> f64 {
        self.memo.get().map_or(1.0, |p| p.pixel_scale())
    }

    fn listener(&self) -> impl FnMut(&CameraProjection) + 'static {
        let memo = Rc::clone(&self.memo);
        let event = self.event_pixel_scale_change.clone();
        move |projection: &CameraProjection| {
            if let Some(prev) = memo.get() {
                if prev.same_bits(projection) {
                    return;
                }
            }
            memo.set(Some(*projection));
            let scale = projection.pixel_scale();
            log::debug!("pixel scale changed to {scale}");
            event.dispatch(&scale);
        }
    }
}
