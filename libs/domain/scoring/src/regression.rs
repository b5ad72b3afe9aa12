// [libs/domain/scoring/src/regression.rs]
/*!
 * =================================================================
 * APARATO: NDVI SLOPE REGRESSION (V9.1)
 * CLASIFICACIÓN: DOMAIN CORE (ESTRATO L2)
 * RESPONSABILIDAD: PENDIENTE OLS DE AÑADAS NDVI Y TENDENCIA MENSUAL
 *
 * # Forma cerrada (mínimos cuadrados ordinarios):
 * slope = Σ(xᵢ−x̄)(yᵢ−ȳ) / Σ(xᵢ−x̄)²
 * Una pendiente indefinida (varianza nula de x, serie vacía o
 * aritmética no finita) se reporta como `None`: sin compuesto.
 * =================================================================
 */

use catastro_domain_models::TrendDirection;

/// Meses mínimos para declarar una tendencia satelital utilizable.
pub const MIN_MONTHS_FOR_TREND: usize = 6;

/// Banda muerta de pendiente mensual: dentro de ella la serie es estable.
const STABLE_SLOPE_EPSILON: f64 = 0.005;

/// Pendiente OLS sobre pares `(year, NDVI)` en forma cerrada.
///
/// La secuencia llega ya deduplicada por año (el cliente STAC elimina
/// duplicados de frontera de tesela con su set `seen_years`).
pub fn least_squares_slope(pairs: &[(i32, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }

    let count = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(year, _)| *year as f64).sum::<f64>() / count;
    let mean_y = pairs.iter().map(|(_, ndvi)| *ndvi).sum::<f64>() / count;

    let mut covariance_sum = 0.0;
    let mut variance_sum = 0.0;
    for (year, ndvi) in pairs {
        let delta_x = *year as f64 - mean_x;
        covariance_sum += delta_x * (*ndvi - mean_y);
        variance_sum += delta_x * delta_x;
    }

    if variance_sum == 0.0 {
        return None;
    }

    let slope = covariance_sum / variance_sum;
    slope.is_finite().then_some(slope)
}

/// Clasifica la serie mensual satelital en una dirección de tendencia
/// junto con su pendiente por mes.
pub fn monthly_trend(monthly_means: &[f64]) -> (TrendDirection, Option<f64>) {
    if monthly_means.len() < MIN_MONTHS_FOR_TREND {
        return (TrendDirection::Insufficient, None);
    }

    let indexed: Vec<(i32, f64)> = monthly_means.iter()
        .enumerate()
        .map(|(index, mean)| (index as i32, *mean))
        .collect();

    match least_squares_slope(&indexed) {
        Some(slope) if slope > STABLE_SLOPE_EPSILON => (TrendDirection::Rising, Some(slope)),
        Some(slope) if slope < -STABLE_SLOPE_EPSILON => (TrendDirection::Falling, Some(slope)),
        Some(slope) => (TrendDirection::Stable, Some(slope)),
        None => (TrendDirection::Insufficient, None),
    }
}
