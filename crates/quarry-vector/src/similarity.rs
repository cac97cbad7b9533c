pub fn dot(a: &[f32], b: &[f32]) -> f64 {
	a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum()
}

pub fn norm(a: &[f32]) -> f64 { dot(a, a).sqrt() }

/// Cosine similarity in `[-1, 1]`; 0 when either vector has zero norm.
///
/// Callers are expected to pass equal-length vectors; extra trailing
/// components of the longer one are ignored.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
	let (na, nb) = (norm(a), norm(b));
	if na == 0.0 || nb == 0.0 { return 0.0; }
	(dot(a, b) / (na * nb)).clamp(-1.0, 1.0) as f32
}
