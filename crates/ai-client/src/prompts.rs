//! Prompts and output schemas.

use expense_core::{currency_symbol, Category, MessageRequest};
use serde_json::{json, Value};

pub const EXTRACTION_SYSTEM_PROMPT: &str = "Eres un extractor preciso de transacciones financieras.";

pub const CLASSIFICATION_SYSTEM_PROMPT: &str =
    "Clasifica texto financiero en categorias usando solo opciones disponibles.";

pub const MESSAGE_SYSTEM_PROMPT: &str = "Eres un asistente financiero empatico y breve. Responde en español.";

pub const OCR_SYSTEM_PROMPT: &str = "Extrae solo el texto visible del comprobante o captura.";

pub const OCR_USER_PROMPT: &str = "Devuelve el texto OCR plano en español sin comentarios.";

/// Schema of an extracted transaction.
pub fn transaction_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "amount": { "type": "number" },
            "currency": { "type": "string" },
            "merchant": { "type": "string" },
            "date": { "type": "string" },
            "cardType": { "type": "string" },
            "bank": { "type": "string" },
            "rawText": { "type": "string" }
        },
        "required": ["amount", "currency", "merchant", "date", "bank", "rawText"],
        "additionalProperties": false
    })
}

/// Schema of a classification result.
pub fn classification_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "categoryId": { "type": ["string", "null"] },
            "confidence": { "type": "number" }
        },
        "required": ["categoryId", "confidence"],
        "additionalProperties": false
    })
}

pub fn extract_transaction_prompt(input: &str) -> String {
    format!(
        r#"Analiza el siguiente texto de un correo electrónico bancario o mensaje de Perú.
Extrae la información de la transacción y genera un JSON que cumpla estrictamente con este esquema: {schema}.
Si el texto no contiene ninguna transacción, responde exactamente: null

REQUERIMIENTOS ADICIONALES:
- Si es un Yape o Plin, el 'merchant' es la persona o negocio que recibió el dinero.
- Si el banco es Interbank, busca el 'Número de Operación' para el 'rawText' si es posible.
- Si la moneda es 'S/' o 'Soles', usa 'PEN'. Si es '$' o 'Dólares', usa 'USD'.
- Si el texto contiene múltiples transacciones, extrae solo la más reciente o principal.
- Si el campo 'cardType' no es explícito pero es Yape/Plin, pon 'Billetera Digital'.

TEXTO:
"""
{input}
""""#,
        schema = transaction_schema(),
        input = input
    )
}

pub fn classify_category_prompt(reply: &str, categories: &[Category]) -> String {
    let list = categories
        .iter()
        .map(|c| format!("- {}: {} ({})", c.id, c.name, c.slug))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Clasifica la respuesta del usuario a una categoria existente.
Devuelve JSON valido con: {{"categoryId": string | null, "confidence": number}}.
confidence debe estar entre 0 y 1.
Si no hay match claro, categoryId debe ser null.

Categorias disponibles:
{list}

Respuesta del usuario:
{reply}"#
    )
}

pub fn generate_message_prompt(request: &MessageRequest) -> String {
    match request {
        MessageRequest::AskCategory {
            amount,
            currency,
            merchant,
        } => format!(
            "Genera un mensaje breve y empatico en español para pedir categoria del gasto.\nMonto: {} {:.2}\nComercio: {}",
            currency_symbol(currency),
            amount,
            merchant
        ),
        MessageRequest::Confirmation { category_name } => format!(
            "Genera un mensaje breve y empatico en español confirmando categorizacion.\nCategoria: {}",
            category_name
        ),
    }
}
