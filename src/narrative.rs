//! Per-pool narrative generation.
//!
//! Best-effort OpenAI chat-completions call producing one short explanatory
//! paragraph per recommended pool. Strictly post-ranking: a failed or skipped
//! narrative never changes which pools are recommended or their order. With
//! no API key configured the generator is disabled and returns nothing.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::warn;

use crate::types::{RecommendError, RecommendRequest, ScoredPool};

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Creative-but-stable sampling for explanatory prose.
const TEMPERATURE: f64 = 0.4;

const SYSTEM_MESSAGE: &str = "You are a concise DeFi investment explainer.";

// ============================================
// API RESPONSE TYPES
// ============================================

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// One generated explanation, keyed back to its pool.
#[derive(Debug, Clone, Serialize)]
pub struct Narrative {
    pub pool: Option<String>,
    pub project: Option<String>,
    pub symbol: Option<String>,
    pub text: String,
}

// ============================================
// RISK LABEL
// ============================================

/// Coarse risk/return label from horizon-scaled downside and period return.
pub fn risk_label(period_return_pct: f64, downside_period: f64) -> &'static str {
    if downside_period >= 0.25 {
        if period_return_pct >= 6.0 {
            "High risk / high return"
        } else {
            "High risk / uncertain return"
        }
    } else if downside_period <= 0.10 {
        if period_return_pct <= 5.0 {
            "Low risk / conservative return"
        } else {
            "Low risk / efficient return"
        }
    } else {
        "Moderate risk / balanced return"
    }
}

// ============================================
// NARRATOR
// ============================================

pub struct Narrator {
    http_client: Client,
    api_key: Option<String>,
    model: String,
    /// Display symbol of the reference asset (amounts are denominated in it).
    ref_symbol: String,
}

impl Narrator {
    pub fn new(
        api_key: Option<String>,
        model: &str,
        ref_symbol: &str,
        timeout_secs: u64,
    ) -> Result<Self, RecommendError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| RecommendError::Provider(format!("http client: {e}")))?;

        Ok(Self {
            http_client,
            api_key,
            model: model.to_string(),
            ref_symbol: ref_symbol.to_string(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate one narrative per row, in ranked order. Disabled (no API key)
    /// yields an empty list; a per-row failure yields a marker text so the
    /// row count still matches.
    pub async fn explain_all(
        &self,
        rows: &[ScoredPool],
        request: &RecommendRequest,
    ) -> Vec<Narrative> {
        let Some(ref api_key) = self.api_key else {
            return Vec::new();
        };

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let text = match self.complete(api_key, &self.build_prompt(row, request)).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(pool = row.pool_id(), "narrative generation failed: {e}");
                    format!("(Narrative unavailable: {e})")
                }
            };
            out.push(Narrative {
                pool: row.pool.clone(),
                project: row.project.clone(),
                symbol: row.symbol.clone(),
                text,
            });
        }
        out
    }

    async fn complete(&self, api_key: &str, prompt: &str) -> Result<String, reqwest::Error> {
        let body = json!({
            "model": self.model,
            "temperature": TEMPERATURE,
            "messages": [
                {"role": "system", "content": SYSTEM_MESSAGE},
                {"role": "user", "content": prompt},
            ],
        });

        let response: ChatResponse = self
            .http_client
            .post(OPENAI_CHAT_URL)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default()
            .trim()
            .to_string())
    }

    fn build_prompt(&self, row: &ScoredPool, request: &RecommendRequest) -> String {
        let risk_line = risk_label(row.period_return_pct, row.downside_period);
        let style = if row.why.style.is_empty() {
            row.category.clone().unwrap_or_else(|| "pool".to_string())
        } else {
            row.why.style.clone()
        };
        let exposure = row.exposure.as_deref().unwrap_or("unknown exposure");
        let url = row.url.as_deref().unwrap_or("");
        let sym = &self.ref_symbol;
        let usd_tail = match row.profit_usd {
            Some(usd) => format!(" (~${usd:.2})"),
            None => String::new(),
        };

        format!(
            "You are a helpful, concise investment explainer for DeFi pools. \
             Write 1 short paragraph (120-160 words).\n\
             Audience: a crypto user deciding where to deploy LP capital on {chain}.\n\
             \n\
             INPUTS\n\
             - User amount: {amount} {sym}\n\
             - Horizon: {horizon} months\n\
             - Risk tolerance: {risk}\n\
             - Pool: {project} - {symbol} (category: {style}, exposure: {exposure})\n\
             - Link: {url}\n\
             - TVL: ${tvl:.0}\n\
             - Current APY (raw): {apy_now:.3}%\n\
             - Net APY (risk-adjusted estimate): {apy_net:.3}%\n\
             - Expected period return over horizon: {period_return:.2}%\n\
             - Expected profit at maturity: {profit} {sym}{usd_tail}\n\
             - Liquidity/throughput score: {throughput:.3}\n\
             - Confidence proxy: {confidence:.3}\n\
             - Downside (horizon-scaled): {downside:.3}\n\
             - Risk/return style: {risk_line}\n\
             - Impermanent loss penalty applied (pct pts): {il_pen}\n\
             \n\
             TASK\n\
             - In a neutral, professional tone, explain:\n\
             1) Why this pool might fit the user's inputs (horizon, risk),\n\
             2) What drives the return (fees vs rewards) and the main risks (IL if dual, volatility),\n\
             3) A plain-English read on the profit figure above,\n\
             4) A brief caution if TVL/throughput/confidence is low.\n\
             - Avoid hype. Be specific to the data above. Do NOT promise outcomes.\n\
             - End with a one-sentence disclaimer: \"Not financial advice.\"",
            chain = request.chain,
            amount = request.principal,
            horizon = request.horizon_months,
            risk = request.risk,
            project = row.project.as_deref().unwrap_or("?"),
            symbol = row.symbol.as_deref().unwrap_or("?"),
            tvl = row.tvl_usd,
            apy_now = row.apy_now,
            apy_net = row.apy_net_estimate,
            period_return = row.period_return_pct,
            profit = row.profit,
            throughput = row.throughput,
            confidence = row.confidence,
            downside = row.downside_period,
            il_pen = row.why.il_penalty_pct_pts,
        )
    }
}
