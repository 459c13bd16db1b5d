use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    File {
        file_name: String,
        content_type: String,
        data: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Empty,
    /// `application/x-www-form-urlencoded` fields.
    Form(Vec<(String, String)>),
    Multipart(Vec<(String, FormValue)>),
}

/// A transport-independent description of an HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl RequestSpec {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn post(url: Url, body: RequestBody) -> Self {
        Self {
            method: Method::Post,
            url,
            headers: Vec::new(),
            body,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.set_header(name, value);
        self
    }

    /// Set a header, replacing any existing value with the same name.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Text value of a form or multipart field.
    pub fn form_value(&self, name: &str) -> Option<&str> {
        match &self.body {
            RequestBody::Empty => None,
            RequestBody::Form(fields) => fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            RequestBody::Multipart(parts) => parts.iter().find_map(|(k, v)| match v {
                FormValue::Text(text) if k == name => Some(text.as_str()),
                _ => None,
            }),
        }
    }

    pub fn has_field(&self, name: &str) -> bool {
        match &self.body {
            RequestBody::Empty => false,
            RequestBody::Form(fields) => fields.iter().any(|(k, _)| k == name),
            RequestBody::Multipart(parts) => parts.iter().any(|(k, _)| k == name),
        }
    }
}

/// Accumulates multipart form fields in order.
#[derive(Debug, Clone, Default)]
pub struct FormBuilder {
    parts: Vec<(String, FormValue)>,
}

impl FormBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.parts
            .push((name.to_string(), FormValue::Text(value.into())));
        self
    }

    pub fn file(&mut self, name: &str, file_name: &str, data: Vec<u8>) -> &mut Self {
        self.parts.push((
            name.to_string(),
            FormValue::File {
                file_name: file_name.to_string(),
                content_type: "application/octet-stream".to_string(),
                data,
            },
        ));
        self
    }

    pub fn build(self) -> RequestBody {
        RequestBody::Multipart(self.parts)
    }
}
