/// A thin wrapper around a reqwest client that knows the API base URL and attaches a
/// user's API key to every request.
#[derive(Clone, Debug)]
pub struct TestClient {
    base: String,
    client: reqwest::Client,
    api_key: Option<String>,
}

impl TestClient {
    pub fn new(base: String) -> Self {
        Self {
            base,
            client: reqwest::Client::builder()
                .cookie_store(true)
                .build()
                .unwrap(),
            api_key: None,
        }
    }

    /// A copy of this client that authenticates with the given API key.
    pub fn with_api_key(&self, key: &str) -> Self {
        Self {
            base: self.base.clone(),
            client: self.client.clone(),
            api_key: Some(key.to_string()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }

    fn add_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.add_auth(self.client.get(self.url(path)))
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.add_auth(self.client.post(self.url(path)))
    }

    pub fn put(&self, path: &str) -> reqwest::RequestBuilder {
        self.add_auth(self.client.put(self.url(path)))
    }

    pub fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.add_auth(self.client.delete(self.url(path)))
    }
}
