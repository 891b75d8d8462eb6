//! Turns tool outcomes into the text shown to the user.
//!
//! Payloads are decoded into per-layout records whose fields are all
//! optional; anything missing or of an unexpected type shows as `n/a`.
//! Payloads that are not JSON objects go to the generic renderer.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::agent_engine::state::{ToolCallRequest, ToolOutcome};
use crate::tools::{Layout, ToolRegistry};

const UNKNOWN: &str = "n/a";

pub struct ResponseFormatter {
    registry: Arc<ToolRegistry>,
}

impl ResponseFormatter {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn format(&self, request: &ToolCallRequest, outcome: &ToolOutcome) -> String {
        let payload = match outcome {
            ToolOutcome::Failure { reason } => {
                return format!("Could not complete request: {reason}");
            }
            ToolOutcome::Success { payload } => payload,
        };

        if let Some(error) = payload.get("error").filter(|e| !e.is_null()) {
            return apology(request, error);
        }

        let rendered = match self.registry.layout(request.tool_name()) {
            Some(Layout::CarOffers) => decode::<CarOffers>(payload).map(|r| r.render()),
            Some(Layout::CarDetails) => decode::<CarDetails>(payload).map(|r| r.render()),
            Some(Layout::BookingConfirmation) => {
                decode::<BookingConfirmation>(payload).map(|r| r.render())
            }
            None => None,
        };
        rendered.unwrap_or_else(|| render_generic(payload))
    }
}

fn decode<T: DeserializeOwned>(payload: &Value) -> Option<T> {
    if !payload.is_object() {
        return None;
    }
    serde_json::from_value(payload.clone()).ok()
}

/// "Sorry, ..." naming the values the user asked about.
fn apology(request: &ToolCallRequest, error: &Value) -> String {
    let detail = scalar_text(error).unwrap_or_else(|| error.to_string());
    let asked: Vec<String> = request
        .params()
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect();
    if asked.is_empty() {
        format!("Sorry, that did not work: {detail}")
    } else {
        format!("Sorry, that did not work ({}): {detail}", asked.join(", "))
    }
}

fn render_generic(payload: &Value) -> String {
    match payload {
        Value::Object(map) if map.is_empty() => "The service returned no data.".to_string(),
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let width = keys.iter().map(|k| k.chars().count()).max().unwrap_or(0);
            let mut out = String::from("Result:");
            for key in keys {
                let value = render_value(&map[key]);
                let _ = write!(out, "\n  {:<width$}  {}", format!("{key}:"), value, width = width + 1);
            }
            out
        }
        Value::Null => "The service returned no data.".to_string(),
        other => render_value(other),
    }
}

fn render_value(value: &Value) -> String {
    scalar_text(value).unwrap_or_else(|| match value {
        Value::Null => UNKNOWN.to_string(),
        other => other.to_string(),
    })
}

/// Strings as-is, numbers and booleans stringified, everything else None.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_text(&value))
}

fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

fn or_unknown(field: &Option<String>) -> &str {
    field.as_deref().unwrap_or(UNKNOWN)
}

#[derive(Debug, Deserialize)]
struct CarOffers {
    #[serde(default, deserialize_with = "lenient_text")]
    location: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    available_cars: Vec<CarOffer>,
}

#[derive(Debug, Deserialize)]
struct CarOffer {
    #[serde(default, deserialize_with = "lenient_text")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    model: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    price_per_day: Option<String>,
}

impl CarOffers {
    fn render(&self) -> String {
        let location = or_unknown(&self.location);
        if self.available_cars.is_empty() {
            return format!("No cars available in {location}.");
        }
        let mut out = format!("Available cars in {location}:");
        for car in &self.available_cars {
            let price = car
                .price_per_day
                .as_deref()
                .map(|p| format!("{p} EUR/day"))
                .unwrap_or_else(|| UNKNOWN.to_string());
            let _ = write!(
                out,
                "\n  - {:<20} {:>12}  (ID: {})",
                or_unknown(&car.model),
                price,
                or_unknown(&car.id)
            );
        }
        out
    }
}

#[derive(Debug, Deserialize)]
struct CarDetails {
    #[serde(default, deserialize_with = "lenient_text")]
    car_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    model: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    seats: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    price_per_day: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    transmission: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    fuel: Option<String>,
}

impl CarDetails {
    fn render(&self) -> String {
        let price = self
            .price_per_day
            .as_deref()
            .map(|p| format!("{p} EUR"))
            .unwrap_or_else(|| UNKNOWN.to_string());
        let mut out = String::from("Details:");
        let _ = write!(out, "\n  Car:          {}", or_unknown(&self.model));
        if let Some(id) = &self.car_id {
            let _ = write!(out, "\n  ID:           {id}");
        }
        let _ = write!(out, "\n  Seats:        {}", or_unknown(&self.seats));
        let _ = write!(out, "\n  Price/day:    {price}");
        let _ = write!(out, "\n  Transmission: {}", or_unknown(&self.transmission));
        let _ = write!(out, "\n  Fuel:         {}", or_unknown(&self.fuel));
        out
    }
}

#[derive(Debug, Deserialize)]
struct BookingConfirmation {
    #[serde(default, deserialize_with = "lenient_text")]
    status: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    booking_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    car_model: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    customer: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pickup_date: Option<String>,
}

impl BookingConfirmation {
    fn render(&self) -> String {
        let mut out = String::from("Booking confirmed!");
        if let Some(status) = &self.status {
            let _ = write!(out, "\n  Status:         {status}");
        }
        let _ = write!(out, "\n  Booking number: {}", or_unknown(&self.booking_id));
        let _ = write!(out, "\n  Car:            {}", or_unknown(&self.car_model));
        let _ = write!(out, "\n  Customer:       {}", or_unknown(&self.customer));
        let _ = write!(out, "\n  Pick-up date:   {}", or_unknown(&self.pickup_date));
        out
    }
}
