use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::Client;

use crate::app::Result;
use crate::config::HttpConfig;
use crate::fetcher::{
    FormValue, HttpResponse, HttpTransport, Method, RequestBody, RequestSpec, TransportError,
};

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .gzip(true)
            .brotli(true)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client })
    }
}

fn multipart_form(parts: Vec<(String, FormValue)>) -> std::result::Result<Form, TransportError> {
    let mut form = Form::new();
    for (name, value) in parts {
        form = match value {
            FormValue::Text(text) => form.text(name, text),
            FormValue::File {
                file_name,
                content_type,
                data,
            } => {
                let part = Part::bytes(data)
                    .file_name(file_name)
                    .mime_str(&content_type)?;
                form.part(name, part)
            }
        };
    }
    Ok(form)
}

#[async_trait]
impl HttpTransport for HttpFetcher {
    async fn execute(
        &self,
        request: RequestSpec,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let url = request.url.clone();

        let mut builder = match request.method {
            Method::Get => self.client.get(request.url),
            Method::Post => self.client.post(request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Form(fields) => {
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(fields.iter())
                    .finish();
                builder
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(encoded)
            }
            RequestBody::Multipart(parts) => builder.multipart(multipart_form(parts)?),
        };

        let response = builder.send().await?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response.bytes().await?.to_vec();

        tracing::debug!("{} {} ({} bytes)", status, url, body.len());

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
