#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
pub fn magnitude(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

/// Scales `v` to unit length. Zero vectors are left untouched.
#[inline]
pub fn normalize(v: &mut [f32]) {
    let norm = magnitude(v);
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[inline]
pub fn normalized(v: &[f32]) -> Vec<f32> {
    let mut out = v.to_vec();
    normalize(&mut out);
    out
}

/// Angular distance between two unit vectors: `sqrt(2 - 2 cos)`, in `[0, 2]`.
///
/// A zero vector has cosine 0 with everything, so it sits at `sqrt(2)` from
/// every other item.
#[inline]
pub fn angular_distance(a: &[f32], b: &[f32]) -> f32 {
    (2.0 - 2.0 * dot(a, b)).max(0.0).sqrt()
}
