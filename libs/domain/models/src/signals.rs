// [libs/domain/models/src/signals.rs]
/*!
 * =================================================================
 * APARATO: SIGNAL TYPE REGISTRY (V7.0)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CATÁLOGO DE CÓDIGOS DE SEÑAL Y PESOS CANÓNICOS
 * =================================================================
 */

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Origen de una señal registrada.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalOrigin {
    /// Producida por este sistema (evaluadores de deterioro).
    Native,
    /// Producida por el curador de motivación externo; solo lectura.
    Motivation,
}

/// Definición de una señal en el registro de tipos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalDefinition {
    pub code: &'static str,
    pub weight: f64,
    pub origin: SignalOrigin,
}

/// Registro canónico de señales. Los códigos de motivación se consumen
/// solo lectura desde la tabla externa `motivation_signals`.
pub static SIGNAL_REGISTRY: Lazy<Vec<SignalDefinition>> = Lazy::new(|| {
    vec![
        SignalDefinition { code: "vegetation_overgrowth", weight: 2.0, origin: SignalOrigin::Native },
        SignalDefinition { code: "vegetation_neglect", weight: 1.5, origin: SignalOrigin::Native },
        SignalDefinition { code: "flood_risk", weight: 1.5, origin: SignalOrigin::Native },
        SignalDefinition { code: "structural_change", weight: 2.5, origin: SignalOrigin::Native },
        SignalDefinition { code: "usps_vacancy", weight: 2.5, origin: SignalOrigin::Native },
        SignalDefinition { code: "absentee_owner", weight: 1.0, origin: SignalOrigin::Motivation },
        SignalDefinition { code: "high_equity", weight: 1.0, origin: SignalOrigin::Motivation },
        SignalDefinition { code: "tax_delinquent", weight: 1.0, origin: SignalOrigin::Motivation },
        SignalDefinition { code: "pre_foreclosure", weight: 1.0, origin: SignalOrigin::Motivation },
        SignalDefinition { code: "code_violation", weight: 1.0, origin: SignalOrigin::Motivation },
    ]
});

static REGISTRY_INDEX: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    SIGNAL_REGISTRY.iter().map(|definition| (definition.code, definition.weight)).collect()
});

/// Peso registrado para un código de señal, si existe.
pub fn signal_weight(code: &str) -> Option<f64> {
    REGISTRY_INDEX.get(code).copied()
}
