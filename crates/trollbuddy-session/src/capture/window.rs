use std::collections::VecDeque;

use super::CapturedImage;

/// Bounded window of captured images, most recent first.
#[derive(Debug, Clone)]
pub struct CaptureWindow {
    images: VecDeque<CapturedImage>,
    capacity: usize,
}

impl CaptureWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            images: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Insert at the front. Returns the image evicted from the back, if any.
    pub fn push_front(&mut self, image: CapturedImage) -> Option<CapturedImage> {
        self.images.push_front(image);
        if self.images.len() > self.capacity {
            self.images.pop_back()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.images.len() >= self.capacity
    }

    pub fn to_vec(&self) -> Vec<CapturedImage> {
        self.images.iter().cloned().collect()
    }
}
