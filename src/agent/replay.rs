//! Replay Buffer
//!
//! Experience replay buffer for off-policy learning.

use std::collections::VecDeque;

use rand::seq::SliceRandom;
use rand::thread_rng;

/// A single transition in the environment
#[derive(Debug, Clone)]
pub struct Transition {
    /// Observation before the action
    pub state: Vec<f32>,
    /// Discrete action index taken
    pub action: usize,
    /// Reward received
    pub reward: f32,
    /// Observation after the action
    pub next_state: Vec<f32>,
    /// Whether the episode reached a terminal state (bootstrapping stops)
    pub done: bool,
}

/// Ring buffer of transitions with uniform random sampling
#[derive(Debug)]
pub struct ReplayBuffer {
    buffer: VecDeque<Transition>,
    capacity: usize,
}

impl ReplayBuffer {
    /// Create a new replay buffer with given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a transition, evicting the oldest once at capacity.
    pub fn push(&mut self, transition: Transition) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(transition);
    }

    /// Sample a random batch of transitions.
    pub fn sample(&self, batch_size: usize) -> Vec<Transition> {
        let mut rng = thread_rng();
        let mut indices: Vec<usize> = (0..self.buffer.len()).collect();
        indices.shuffle(&mut rng);

        indices
            .into_iter()
            .take(batch_size.min(self.buffer.len()))
            .map(|i| self.buffer[i].clone())
            .collect()
    }

    /// Current number of stored transitions.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Buffer capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Check if the buffer holds enough samples for training.
    pub fn has_enough_samples(&self, min_samples: usize) -> bool {
        self.buffer.len() >= min_samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_transition(reward: f32) -> Transition {
        Transition {
            state: vec![0.0; 25],
            action: 1,
            reward,
            next_state: vec![0.0; 25],
            done: false,
        }
    }

    #[test]
    fn test_push_evicts_oldest_at_capacity() {
        let mut buffer = ReplayBuffer::new(10);
        for i in 0..15 {
            buffer.push(make_transition(i as f32));
        }

        assert_eq!(buffer.len(), 10);
        // Oldest five evicted
        assert!(buffer.buffer.iter().all(|t| t.reward >= 5.0));
    }

    #[test]
    fn test_sample_size() {
        let mut buffer = ReplayBuffer::new(100);
        for i in 0..50 {
            buffer.push(make_transition(i as f32));
        }

        assert_eq!(buffer.sample(10).len(), 10);
        assert_eq!(buffer.sample(80).len(), 50);
    }

    #[test]
    fn test_has_enough_samples() {
        let mut buffer = ReplayBuffer::new(100);
        assert!(!buffer.has_enough_samples(1));
        buffer.push(make_transition(0.0));
        assert!(buffer.has_enough_samples(1));
    }
}
