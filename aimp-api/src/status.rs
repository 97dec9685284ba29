//! Numeric status namespace understood by `get_custom_status` / `set_custom_status`

/// Player status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StatusCode {
    Volume = 1,
    Balance = 2,
    Speed = 3,
    Play = 4,
    Mute = 5,
    Reverb = 6,
    Echo = 7,
    Chorus = 8,
    Flanger = 9,
    Equalizer = 10,
    RepeatSong = 29,
    Stop = 30,
    Position = 31,
    Length = 32,
    RepeatPlaylist = 33,
    RepeatPlaylistOne = 34,
    Kbps = 35,
    Khz = 36,
    Mode = 37,
    Radio = 38,
    StreamType = 39,
    Timer = 40,
    Shuffle = 41,
}

impl StatusCode {
    /// Code as sent on the wire
    pub fn code(self) -> u8 {
        self as u8
    }
}
