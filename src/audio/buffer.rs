use std::ops::Range;

/// Planar multi-channel sample buffer with a fixed shape.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    data: Vec<f32>,
    num_channels: usize,
    num_samples: usize,
}

impl AudioBuffer {
    pub fn new(num_channels: usize, num_samples: usize) -> Self {
        Self {
            data: vec![0.0; num_channels * num_samples],
            num_channels,
            num_samples,
        }
    }

    /// Builds a buffer from one slice per channel. Every channel must have
    /// the same length.
    pub fn from_channels(channels: &[&[f32]]) -> Self {
        let num_samples = channels.first().map_or(0, |c| c.len());
        debug_assert!(channels.iter().all(|c| c.len() == num_samples));
        let mut buffer = Self::new(channels.len(), num_samples);
        for (i, channel) in channels.iter().enumerate() {
            buffer.channel_mut(i)[..channel.len()].copy_from_slice(channel);
        }
        buffer
    }

    pub const fn num_channels(&self) -> usize {
        self.num_channels
    }

    pub const fn num_samples(&self) -> usize {
        self.num_samples
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        let start = index * self.num_samples;
        &self.data[start..start + self.num_samples]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        let start = index * self.num_samples;
        &mut self.data[start..start + self.num_samples]
    }

    pub fn clear_channel(&mut self, index: usize) {
        self.channel_mut(index).fill(0.0);
    }

    /// Borrows `range` of the first two channels at once. The right slice is
    /// `None` for a mono buffer.
    pub fn left_right_mut(&mut self, range: Range<usize>) -> (&mut [f32], Option<&mut [f32]>) {
        let (left, rest) = self.data.split_at_mut(self.num_samples);
        let right = if self.num_channels > 1 {
            Some(&mut rest[range.clone()])
        } else {
            None
        };
        (&mut left[range], right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_are_planar() {
        let buffer = AudioBuffer::from_channels(&[&[1.0, 2.0], &[3.0, 4.0]]);
        assert_eq!(buffer.num_channels(), 2);
        assert_eq!(buffer.num_samples(), 2);
        assert_eq!(buffer.channel(0), &[1.0, 2.0]);
        assert_eq!(buffer.channel(1), &[3.0, 4.0]);
    }

    #[test]
    fn left_right_split() {
        let mut buffer = AudioBuffer::from_channels(&[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]]);
        let (left, right) = buffer.left_right_mut(1..3);
        assert_eq!(left, &[2.0, 3.0]);
        let right = right.unwrap();
        right[0] = 0.0;
        assert_eq!(buffer.channel(1), &[4.0, 0.0, 6.0]);
    }

    #[test]
    fn mono_has_no_right() {
        let mut buffer = AudioBuffer::new(1, 8);
        assert!(buffer.left_right_mut(0..8).1.is_none());
    }
}
