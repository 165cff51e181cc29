use std::collections::HashSet;

const FINANCIAL_ANALYST_PROMPT: &str = r#"You are a world-class financial analyst. Dissect the following YouTube video transcript and extract only the most critical financial information.

Provide a concise, data-driven summary using these markdown headings:

### Stock Suggestions
For each stock, company or asset mentioned, state what is being suggested in terms of investment, options and similar positions.

### Core Strategies & Theses
Summarize the main investment strategies or financial arguments presented in the video.

### Economic & Market Outlook
Describe any discussion of macroeconomic trends, market sentiment or economic indicators (e.g. inflation, interest rates).

---

IMPORTANT: If the transcript contains no relevant financial information, respond with the single sentence: "No significant financial information was found in this video." Do not invent or infer information.

Here is the transcript:
---
"#;

const DAY_TRADING_RECAP_PROMPT: &str = r#"You are an expert day trading analyst reviewing the transcript of a veteran day trader's daily recap video. Extract specific, actionable trading data.

### Stocks Traded
Which stocks were traded, what went well and what mistakes were made. Describe what led to each profitable or losing trade and the specific strategy used.

### Economic & Market Outlook
Describe any discussion of macroeconomic trends, market sentiment or economic indicators (e.g. inflation, interest rates).

### Total Money Made
How much money the trader made over the session. Include a per-trade breakdown if available and flag every red (negative) trade.

---

IMPORTANT: If the transcript is not about specific trades, state that clearly.

Here is the transcript:
---
"#;

/// Prompt templates for the generation jobs.
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    day_trading_channels: HashSet<String>,
}

impl Default for PromptCatalog {
    fn default() -> Self {
        Self::new(["Ross Cameron"])
    }
}

impl PromptCatalog {
    /// Videos from `day_trading_channels` get the trading-recap template.
    pub fn new<I, S>(day_trading_channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            day_trading_channels: day_trading_channels
                .into_iter()
                .map(|c| c.as_ref().trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }

    fn is_day_trading_channel(&self, channel: Option<&str>) -> bool {
        channel
            .map(|c| self.day_trading_channels.contains(&c.trim().to_lowercase()))
            .unwrap_or(false)
    }

    /// Summary prompt for a transcript, chosen by the channel it came from.
    pub fn video_summary(&self, channel: Option<&str>, transcript: &str) -> String {
        let template = if self.is_day_trading_channel(channel) {
            DAY_TRADING_RECAP_PROMPT
        } else {
            FINANCIAL_ANALYST_PROMPT
        };
        format!("{template}{transcript}")
    }

    /// Analysis prompt for a ticker. Meant to be sent with web grounding enabled.
    pub fn trading_insight(&self, symbol: &str) -> String {
        format!(
            r#"You are a seasoned stock market analyst and an expert in high-speed momentum trading.
Analyze the stock with ticker symbol "{symbol}" on the points below. Use web search to gather the latest available data about "{symbol}" from this year.

- **Current Trend:** Is sentiment bullish, bearish or neutral based on recent price action?
- **Key Support & Resistance Levels:** Important price levels on the daily chart, including resistance at the 200-day moving average.
- **Potential Catalyst:** One upcoming event or factor that could significantly move the price.
- **Short Interest:** Current short interest and the likelihood of a short squeeze.
- **Outstanding Float:** Public float, any dilution over the past year, and any shelf registration for future dilution.
- **History:** Big moves over the past year, including sharp reversals that make the stock risky.
- **Recent Filings or News:** Recent news or filings that should influence a trading decision.
- **Recent IPO or Reverse Split:** Whether the stock recently IPO'd or went through a reverse split.

Format the response so it can be digested quickly. Do not give financial advice or make up numbers. If you don't know something, skip it."#
        )
    }
}
