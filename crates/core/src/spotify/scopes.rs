//! OAuth scopes requested when a user links their Spotify account.

/// Every scope the application asks for up front. Spotify returns the
/// granted set in the token response; the stored record keeps that value.
pub const ALL: &str = "user-read-private user-read-email user-library-read user-library-modify \
     user-read-playback-state user-modify-playback-state user-read-currently-playing \
     user-read-recently-played user-top-read playlist-read-private playlist-read-collaborative \
     playlist-modify-private playlist-modify-public ugc-image-upload app-remote-control \
     streaming user-follow-read user-follow-modify";
