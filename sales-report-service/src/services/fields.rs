//! Ordered field-name fallback chains for schema-inconsistent source documents.
//!
//! Every logical field is a named list of candidate keys. Lookups walk the list
//! in order and the first usable value wins. The order is part of the report
//! contract: reordering a chain changes which value shows up in reports.

use crate::models::RawDocument;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldChain {
    pub name: &'static str,
    pub candidates: &'static [&'static str],
}

pub const DOCUMENT_ID: FieldChain = FieldChain {
    name: "documentId",
    candidates: &["_id", "id"],
};

pub const INVOICE_NUMBER: FieldChain = FieldChain {
    name: "invoiceNumber",
    candidates: &["invoiceNumber", "invoiceNo", "number"],
};

pub const RETURN_NUMBER: FieldChain = FieldChain {
    name: "returnNumber",
    candidates: &["returnNumber", "returnNo", "number", "invoiceNumber"],
};

/// Invoice number a return was raised against.
pub const RETURN_REFERENCE: FieldChain = FieldChain {
    name: "originalInvoiceNumber",
    candidates: &[
        "originalInvoiceNumber",
        "referenceNumber",
        "refInvoiceNumber",
        "invoiceNumber",
    ],
};

pub const DATE: FieldChain = FieldChain {
    name: "date",
    candidates: &["date", "invoiceDate", "returnDate", "createdAt"],
};

pub const BRANCH: FieldChain = FieldChain {
    name: "branchId",
    candidates: &["branchId", "branch"],
};

pub const WAREHOUSE: FieldChain = FieldChain {
    name: "warehouseId",
    candidates: &["warehouseId", "warehouse"],
};

pub const CUSTOMER_NAME: FieldChain = FieldChain {
    name: "customerName",
    candidates: &["customerName", "customer", "clientName", "client"],
};

pub const CUSTOMER_PHONE: FieldChain = FieldChain {
    name: "customerPhone",
    candidates: &[
        "customerPhone",
        "customerMobile",
        "customerNumber",
        "phone",
        "mobile",
        "phoneNumber",
    ],
};

pub const SELLER: FieldChain = FieldChain {
    name: "seller",
    candidates: &[
        "seller",
        "sellerId",
        "delegate",
        "delegateId",
        "salesRepresentative",
        "salesRep",
    ],
};

pub const PAYMENT_METHOD: FieldChain = FieldChain {
    name: "paymentMethod",
    candidates: &["paymentMethod", "paymentType", "payment"],
};

pub const EXTRA_DISCOUNT: FieldChain = FieldChain {
    name: "extraDiscount",
    candidates: &["extraDiscount", "additionalDiscount", "invoiceDiscount"],
};

pub const ITEM_NUMBER: FieldChain = FieldChain {
    name: "itemNumber",
    candidates: &["itemNumber", "itemCode", "code", "sku", "barcode"],
};

pub const ITEM_NAME: FieldChain = FieldChain {
    name: "itemName",
    candidates: &["itemName", "name", "productName", "description"],
};

pub const UNIT: FieldChain = FieldChain {
    name: "unit",
    candidates: &["unit", "unitName", "uom"],
};

pub const UNIT_PRICE: FieldChain = FieldChain {
    name: "price",
    candidates: &["price", "unitPrice", "salePrice", "sellingPrice"],
};

pub const SALE_QUANTITY: FieldChain = FieldChain {
    name: "quantity",
    candidates: &["quantity", "qty"],
};

pub const RETURN_QUANTITY: FieldChain = FieldChain {
    name: "returnedQty",
    candidates: &["returnedQty", "returnedQuantity", "quantity"],
};

pub const UNIT_COST: FieldChain = FieldChain {
    name: "cost",
    candidates: &["cost", "costPrice", "unitCost", "purchasePrice"],
};

pub const DISCOUNT_VALUE: FieldChain = FieldChain {
    name: "discountValue",
    candidates: &["discountValue", "discountAmount", "discount"],
};

pub const DISCOUNT_PERCENT: FieldChain = FieldChain {
    name: "discountPercent",
    candidates: &["discountPercent", "discountRate", "discountPercentage"],
};

pub const TAX_VALUE: FieldChain = FieldChain {
    name: "taxValue",
    candidates: &["taxValue", "taxAmount", "tax", "vat"],
};

pub const TAX_PERCENT: FieldChain = FieldChain {
    name: "taxPercent",
    candidates: &["taxPercent", "taxRate", "vatRate", "taxPercentage"],
};

pub const CATALOG_ID: FieldChain = FieldChain {
    name: "id",
    candidates: &["id", "_id"],
};

pub const CATALOG_PARENT: FieldChain = FieldChain {
    name: "parentId",
    candidates: &["parentId", "parent"],
};

pub const CATALOG_CODE: FieldChain = FieldChain {
    name: "code",
    candidates: &["code", "itemCode", "itemNumber"],
};

pub const CATALOG_NAME: FieldChain = FieldChain {
    name: "name",
    candidates: &["name", "itemName"],
};

pub const CATALOG_TYPE: FieldChain = FieldChain {
    name: "type",
    candidates: &["type", "level"],
};

pub const DISPLAY_NAME: FieldChain = FieldChain {
    name: "name",
    candidates: &["name", "nameAr", "arabicName", "title"],
};

pub const ACCOUNT_NUMBER: FieldChain = FieldChain {
    name: "accountNumber",
    candidates: &["accountNumber", "accountNo", "code"],
};

/// Text form of a scalar value. Empty strings count as absent. Object ids in
/// extended JSON (`{"$oid": ".."}`) are unwrapped.
pub fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("$oid").and_then(text),
        _ => None,
    }
}

/// Numeric form of a value, or `None` if the value is absent. Anything present
/// but unparsable reads as zero.
pub fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Null => return None,
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => {
            let cleaned = s.trim().replace(',', "");
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse::<f64>().unwrap_or(0.0)
        }
        Value::Bool(_) | Value::Array(_) => 0.0,
        // Extended JSON wrappers for Decimal128, Int64 and Double.
        Value::Object(map) => ["$numberDecimal", "$numberLong", "$numberDouble", "$numberInt"]
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(number)
            .unwrap_or(0.0),
    };

    Some(if parsed.is_finite() { parsed } else { 0.0 })
}

/// First non-empty text value along the chain.
pub fn first_text(document: &RawDocument, chain: &FieldChain) -> Option<String> {
    chain
        .candidates
        .iter()
        .find_map(|key| document.get(*key).and_then(text))
}

/// Walk the whole chain on each layer in turn (e.g. item entry, then the
/// enclosing document) before moving to the next layer.
pub fn first_text_in(layers: &[&RawDocument], chain: &FieldChain) -> Option<String> {
    layers
        .iter()
        .find_map(|document| first_text(document, chain))
}

/// First present numeric value along the chain.
pub fn first_number(document: &RawDocument, chain: &FieldChain) -> Option<f64> {
    chain
        .candidates
        .iter()
        .find_map(|key| document.get(*key).and_then(number))
}

pub fn number_or_zero(document: &RawDocument, chain: &FieldChain) -> f64 {
    first_number(document, chain).unwrap_or(0.0)
}
