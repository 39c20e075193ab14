// src/catalog/pricing.rs

use rust_decimal::{Decimal, RoundingStrategy};

use crate::{
    common::error::AppError,
    models::{catalog::Dish, exchange_rate::ExchangeRate},
};

/// Casas decimais do preço em reais.
pub const BRL_SCALE: u32 = 2;

/// Maior preço em reais que cabe em `price_brl NUMERIC(14, 2)`.
pub const BRL_MAX: Decimal = Decimal::from_parts(0x107A_3FFF, 0x5AF3, 0, false, 2);

/// Maior preço em BOB aceito: no teto do câmbio (100) ainda cabe em `BRL_MAX`.
pub const BOB_MAX: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

/// round(price_bob * câmbio, 2), com meio centavo arredondado para longe do zero.
/// Resultado que não cabe na coluna vira `InvalidInput`.
pub fn derive_brl(price_bob: Decimal, rate: &ExchangeRate) -> Result<Decimal, AppError> {
    let brl = price_bob
        .checked_mul(rate.value)
        .map(|product| product.round_dp_with_strategy(BRL_SCALE, RoundingStrategy::MidpointAwayFromZero))
        .filter(|brl| *brl <= BRL_MAX)
        .ok_or_else(|| {
            AppError::InvalidInput(format!(
                "O preço {price_bob} BOB no câmbio {} passa do máximo de {BRL_MAX} BRL",
                rate.value
            ))
        })?;
    Ok(brl)
}

/// Preço do prato calculado a partir do câmbio, sem mexer no registro.
pub fn derive_one(dish: &Dish, rate: &ExchangeRate) -> Result<Decimal, AppError> {
    derive_brl(dish.price_bob, rate)
}

pub fn validate_price_bob(price_bob: Decimal) -> Result<(), AppError> {
    if price_bob.is_sign_negative() && !price_bob.is_zero() {
        return Err(AppError::InvalidInput(format!(
            "O preço em BOB não pode ser negativo (recebido {price_bob})"
        )));
    }
    if price_bob > BOB_MAX {
        return Err(AppError::InvalidInput(format!(
            "O preço em BOB passa do máximo de {BOB_MAX} (recebido {price_bob})"
        )));
    }
    Ok(())
}

/// Recalcula o preço em reais do prato. Devolve `true` se o valor mudou.
pub fn resync(dish: &mut Dish, rate: &ExchangeRate) -> Result<bool, AppError> {
    let derived = derive_one(dish, rate)?;
    if dish.price_brl == derived {
        return Ok(false);
    }
    dish.price_brl = derived;
    Ok(true)
}

/// Preço que nem dá para derivar também conta como fora do câmbio.
pub fn is_in_sync(dish: &Dish, rate: &ExchangeRate) -> bool {
    derive_one(dish, rate).is_ok_and(|derived| dish.price_brl == derived)
}
