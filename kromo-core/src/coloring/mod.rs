//! Greedy vertex colouring engines.
//!
//! [`color_sequential`] visits nodes in index order and is deterministic.
//! [`color_parallel`] colours optimistically across a worker pool and repairs
//! conflicts in follow-up passes until none remain; its assignment may
//! differ between runs but is always valid once it returns `Ok`.

mod parallel;
mod sequential;

use std::{num::NonZeroUsize, thread};

use crate::{
    error::{ColoringError, GraphError},
    graph::{Color, Graph},
};

pub use self::{
    parallel::{color_parallel, color_parallel_subset},
    sequential::color_sequential,
};

/// Summary of a completed colouring run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ColoringReport {
    colors_used: usize,
    passes: usize,
    recolored: usize,
}

impl ColoringReport {
    pub(crate) const fn new(colors_used: usize, passes: usize, recolored: usize) -> Self {
        Self {
            colors_used,
            passes,
            recolored,
        }
    }

    /// Returns the number of distinct colours present after the run.
    #[must_use]
    #[rustfmt::skip]
    pub const fn colors_used(&self) -> usize { self.colors_used }

    /// Returns how many colouring passes ran. Sequential runs report one.
    #[must_use]
    #[rustfmt::skip]
    pub const fn passes(&self) -> usize { self.passes }

    /// Returns how many node recolourings conflict repair scheduled.
    #[must_use]
    #[rustfmt::skip]
    pub const fn recolored(&self) -> usize { self.recolored }
}

/// Selects which colouring engine a [`Colorer`] runs.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ColoringStrategy {
    /// Index-ordered greedy colouring on the calling thread.
    Sequential,
    /// Optimistic greedy colouring across a worker pool.
    #[default]
    Parallel,
}

/// Configures and constructs [`Colorer`] instances.
///
/// Without an explicit palette the colorer uses one colour per node, which
/// greedy colouring can never exhaust.
///
/// # Examples
/// ```
/// use kromo_core::{ColoringBuilder, ColoringStrategy, generate};
///
/// let colorer = ColoringBuilder::new()
///     .with_strategy(ColoringStrategy::Sequential)
///     .with_max_color(3)
///     .build()
///     .expect("configuration is valid");
/// let graph = generate::ring(6).expect("ring must build");
/// let report = colorer.color(&graph).expect("three colours suffice");
/// assert_eq!(report.colors_used(), 2);
/// assert!(graph.check_valid_coloring());
/// ```
#[derive(Clone, Debug, Default)]
pub struct ColoringBuilder {
    max_color: Option<Color>,
    strategy: ColoringStrategy,
    workers: Option<usize>,
}

impl ColoringBuilder {
    /// Creates a builder with the parallel strategy and default sizing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits colours to `0..max_color`.
    #[must_use]
    pub const fn with_max_color(mut self, max_color: Color) -> Self {
        self.max_color = Some(max_color);
        self
    }

    /// Selects the colouring engine.
    #[must_use]
    pub const fn with_strategy(mut self, strategy: ColoringStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the worker count for the parallel engine.
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns [`ColoringError::InvalidMaxColor`] when the palette is empty
    /// and [`GraphError::InvalidWorkerCount`] (wrapped) when zero
    /// workers were requested.
    pub fn build(self) -> Result<Colorer, ColoringError> {
        if let Some(got @ 0) = self.max_color {
            return Err(ColoringError::InvalidMaxColor { got });
        }
        let workers = match self.workers {
            Some(0) => return Err(GraphError::InvalidWorkerCount { got: 0 }.into()),
            Some(workers) => workers,
            None => thread::available_parallelism().map_or(1, NonZeroUsize::get),
        };
        Ok(Colorer {
            max_color: self.max_color,
            strategy: self.strategy,
            workers,
        })
    }
}

/// A validated colouring configuration.
#[derive(Clone, Debug)]
pub struct Colorer {
    max_color: Option<Color>,
    strategy: ColoringStrategy,
    workers: usize,
}

impl Colorer {
    /// Returns the configured strategy.
    #[must_use]
    #[rustfmt::skip]
    pub const fn strategy(&self) -> ColoringStrategy { self.strategy }

    /// Returns the worker count used by the parallel engine.
    #[must_use]
    #[rustfmt::skip]
    pub const fn workers(&self) -> usize { self.workers }

    /// Returns the palette size applied to `graph`.
    #[must_use]
    pub fn max_color_for(&self, graph: &Graph) -> Color {
        self.max_color
            .unwrap_or_else(|| Color::try_from(graph.len()).unwrap_or(Color::MAX))
    }

    /// Colours every node of `graph`, replacing any previous colours.
    ///
    /// # Errors
    /// Returns [`ColoringError::ColorsExhausted`] when the palette is too
    /// small and [`ColoringError::Graph`] when the worker pool fails.
    pub fn color(&self, graph: &Graph) -> Result<ColoringReport, ColoringError> {
        let max_color = self.max_color_for(graph);
        match self.strategy {
            ColoringStrategy::Sequential => color_sequential(graph, max_color),
            ColoringStrategy::Parallel => color_parallel(graph, max_color, self.workers),
        }
    }
}

pub(crate) const fn ensure_palette(max_color: Color) -> Result<(), ColoringError> {
    if max_color == 0 {
        return Err(ColoringError::InvalidMaxColor { got: max_color });
    }
    Ok(())
}

/// Returns the smallest colour below `max_color` absent from `taken`.
///
/// A node of degree `d` always has a free colour in `0..=d`, so only that
/// many slots are tracked.
pub(crate) fn smallest_free(
    taken: impl IntoIterator<Item = Color>,
    degree: usize,
    max_color: Color,
) -> Option<Color> {
    let mut seen = vec![false; degree + 1];
    for color in taken {
        if let Some(slot) = usize::try_from(color).ok().and_then(|idx| seen.get_mut(idx)) {
            *slot = true;
        }
    }
    let free = Color::try_from(seen.iter().position(|used| !used)?).ok()?;
    (free < max_color).then_some(free)
}

#[cfg(test)]
mod tests;
