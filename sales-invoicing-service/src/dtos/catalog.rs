use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct UpsertCatalogServiceRequest {
    #[validate(length(min = 1, max = 200))]
    pub service_name: String,
    pub price_per_unit: Decimal,
}

fn default_receives_commission() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpsertSalesRepRequest {
    #[validate(email)]
    pub email: Option<String>,
    pub commission_rate: Decimal,
    #[serde(default = "default_receives_commission")]
    pub receives_commission: bool,
}
