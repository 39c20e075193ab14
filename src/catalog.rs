// Regras puras do catálogo: ciclo de vida, ordem densa, preço derivado.
pub mod invariants;
pub mod lifecycle;
pub mod ordering;
pub mod pricing;
