//! Purpose: Serde model of the retail transaction export document.
//! Exports: `DataRoot`, `TopListMetadata`, `ScorecardEntry`, `TransactionsInfo`, `Transaction`,
//! `TransactionPayment`, `ReceiptEntry`, `OfferEntry`.
//! Role: Read-only input to `convert`; field names follow the export's JSON keys.
//! Invariants: Missing or null fields decode to defaults (no text, zero, empty list).
//! Invariants: Text fields also accept JSON numbers and booleans, rendered as text.
use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        Some(Value::Bool(flag)) => Ok(Some(flag.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected text, found {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DataRoot {
    #[serde(rename = "TopList")]
    pub top_list: Option<TopListMetadata>,
    #[serde(rename = "TransactionsInfo")]
    pub transactions_info: Option<TransactionsInfo>,
}

impl DataRoot {
    pub fn scorecard(&self) -> &[ScorecardEntry] {
        self.top_list
            .as_ref()
            .map(|top_list| top_list.scorecard.as_slice())
            .unwrap_or_default()
    }

    pub fn transactions(&self) -> &[Transaction] {
        self.transactions_info
            .as_ref()
            .map(|info| info.transactions.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TopListMetadata {
    #[serde(rename = "Scorecard", deserialize_with = "null_as_default")]
    pub scorecard: Vec<ScorecardEntry>,
}

/// One ranked product of the top list.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScorecardEntry {
    #[serde(rename = "Rank", deserialize_with = "null_as_default")]
    pub rank: i64,
    #[serde(rename = "ProductId", deserialize_with = "lenient_text")]
    pub product_id: Option<String>,
    #[serde(rename = "ProductName", deserialize_with = "lenient_text")]
    pub product_name: Option<String>,
    #[serde(rename = "ProductDescription", deserialize_with = "lenient_text")]
    pub product_description: Option<String>,
    /// Creation time, epoch milliseconds.
    #[serde(rename = "Ctime", deserialize_with = "null_as_default")]
    pub created_time: i64,
    /// Modification time, epoch milliseconds.
    #[serde(rename = "Mtime", deserialize_with = "null_as_default")]
    pub modified_time: i64,
    #[serde(rename = "AmountUsed", deserialize_with = "null_as_default")]
    pub amount_used: f64,
    #[serde(rename = "AmountSaved", deserialize_with = "null_as_default")]
    pub amount_saved: f64,
    #[serde(rename = "ProdTxt3", deserialize_with = "lenient_text")]
    pub barcode: Option<String>,
    #[serde(rename = "TimesBought", deserialize_with = "null_as_default")]
    pub times_bought: i64,
    #[serde(rename = "ItemsBought", deserialize_with = "null_as_default")]
    pub items_bought: i64,
    #[serde(rename = "AccountId", deserialize_with = "lenient_text")]
    pub account_id: Option<String>,
    #[serde(rename = "ProductGroupCode", deserialize_with = "lenient_text")]
    pub product_group_code: Option<String>,
    #[serde(rename = "ProductGroupDesc", deserialize_with = "lenient_text")]
    pub product_group_desc: Option<String>,
    #[serde(rename = "Volume", deserialize_with = "null_as_default")]
    pub volume: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TransactionsInfo {
    #[serde(rename = "BonusTotal", deserialize_with = "null_as_default")]
    pub bonus_total: f64,
    #[serde(rename = "PurchaseTotal", deserialize_with = "null_as_default")]
    pub purchase_total: f64,
    #[serde(rename = "DiscountTotal", deserialize_with = "null_as_default")]
    pub discount_total: f64,
    #[serde(rename = "Transactions", deserialize_with = "null_as_default")]
    pub transactions: Vec<Transaction>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Transaction {
    #[serde(rename = "Id", deserialize_with = "lenient_text")]
    pub id: Option<String>,
    /// Epoch milliseconds.
    #[serde(rename = "PurchaseDate", deserialize_with = "null_as_default")]
    pub purchase_date: i64,
    #[serde(rename = "StoreId", deserialize_with = "lenient_text")]
    pub store_id: Option<String>,
    #[serde(rename = "StoreName", deserialize_with = "lenient_text")]
    pub store_name: Option<String>,
    #[serde(rename = "Amount", deserialize_with = "null_as_default")]
    pub amount: f64,
    #[serde(rename = "BonusPoints", deserialize_with = "null_as_default")]
    pub bonus_points: i64,
    #[serde(rename = "Discount", deserialize_with = "null_as_default")]
    pub discount: f64,
    #[serde(rename = "TransactionPayments", deserialize_with = "null_as_default")]
    pub payments: Vec<TransactionPayment>,
    #[serde(rename = "Receipt", deserialize_with = "null_as_default")]
    pub receipt: Vec<ReceiptEntry>,
}

impl Transaction {
    pub fn net_amount(&self) -> f64 {
        self.amount - self.discount
    }

    pub fn has_receipt(&self) -> bool {
        !self.receipt.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TransactionPayment {
    #[serde(rename = "MeansOfPaymentDesc", deserialize_with = "lenient_text")]
    pub means_of_payment_desc: Option<String>,
    #[serde(rename = "Amount", deserialize_with = "null_as_default")]
    pub amount: f64,
}

/// One line of a receipt.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReceiptEntry {
    #[serde(rename = "ProductCode", deserialize_with = "lenient_text")]
    pub product_code: Option<String>,
    #[serde(rename = "ProductDescription", deserialize_with = "lenient_text")]
    pub product_description: Option<String>,
    #[serde(rename = "Prodtxt1", deserialize_with = "lenient_text")]
    pub product_text1: Option<String>,
    #[serde(rename = "Prodtxt2", deserialize_with = "lenient_text")]
    pub product_text2: Option<String>,
    #[serde(rename = "ProdTxt3", deserialize_with = "lenient_text")]
    pub barcode: Option<String>,
    #[serde(rename = "ProductGroupCode", deserialize_with = "lenient_text")]
    pub product_group_code: Option<String>,
    #[serde(rename = "ProductGroupDesc", deserialize_with = "lenient_text")]
    pub product_group_desc: Option<String>,
    #[serde(rename = "BonusBased", deserialize_with = "null_as_default")]
    pub bonus_based: bool,
    #[serde(rename = "Pieces", deserialize_with = "null_as_default")]
    pub pieces: i64,
    #[serde(rename = "Amount", deserialize_with = "null_as_default")]
    pub price: f64,
    /// Negative for a price reduction.
    #[serde(rename = "Discount", deserialize_with = "null_as_default")]
    pub discount: f64,
    #[serde(rename = "Volume", deserialize_with = "null_as_default")]
    pub volume: f64,
    #[serde(rename = "Unit", deserialize_with = "lenient_text")]
    pub unit: Option<String>,
    #[serde(rename = "Deposit", deserialize_with = "null_as_default")]
    pub deposit: f64,
    #[serde(rename = "UsedOffers", deserialize_with = "null_as_default")]
    pub used_offers: Vec<OfferEntry>,
}

impl ReceiptEntry {
    pub fn net_price(&self) -> f64 {
        self.price + self.discount
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OfferEntry {
    #[serde(rename = "OfferCode", deserialize_with = "lenient_text")]
    pub offer_code: Option<String>,
    #[serde(rename = "OfferDesc", deserialize_with = "lenient_text")]
    pub offer_desc: Option<String>,
    #[serde(rename = "Discount", deserialize_with = "null_as_default")]
    pub discount_flat: f64,
    #[serde(rename = "DiscountPercent", deserialize_with = "null_as_default")]
    pub discount_percent: f64,
}
