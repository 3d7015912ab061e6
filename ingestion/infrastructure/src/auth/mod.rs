pub mod oauth;

pub use oauth::{
    OAuthCredentials, RefreshTokenProvider, RefreshTokenProviderParameters, DEFAULT_TOKEN_URL,
};
