//! Label selection over the classifier's probability vector.

/// Index of the maximum probability, scanning left to right with a strict
/// greater-than comparison; ties keep the earliest index.
pub fn max_index(probabilities: &[f32]) -> usize {
    probabilities
        .iter()
        .enumerate()
        .fold(0, |best, (index, &probability)| {
            if probability > probabilities[best] {
                index
            } else {
                best
            }
        })
}
