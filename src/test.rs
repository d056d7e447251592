//! Shared fixtures for unit tests.
//!
//! This module is only compiled when running tests (`#[cfg(test)]`).

use crate::Config;
use tempfile::TempDir;

/// A small but complete SIE 4 file in PC8.
pub(crate) const SMALL_SIE: &[u8] = b"#FLAGGA 0\n\
#PROGRAM \"Bokf\x94ringsprogram\" 1.0\n\
#FORMAT PC8\n\
#GEN 20170301\n\
#SIETYP 4\n\
#FNAMN \"\x99vningsbolaget AB\"\n\
#ORGNR 555555-5555\n\
#RAR 0 20170101 20171231\n\
#RAR -1 20160101 20161231\n\
#KPTYP EUBAS97\n\
#KONTO 1910 \"Kassa\"\n\
#KTYP 1910 T\n\
#KONTO 2440 \"Leverant\x94rsskulder\"\n\
#KTYP 2440 S\n\
#KONTO 3010 \"F\x94rs\x84ljning\"\n\
#KTYP 3010 I\n\
#KONTO 4010 \"Ink\x94p\"\n\
#KTYP 4010 K\n\
#IB 0 1910 10000.00\n\
#UB 0 1910 10250.00\n\
#IB -1 1910 8000.00\n\
#UB -1 1910 10000.00\n\
#RES 0 3010 -500.00\n\
#RES 0 4010 250.00\n\
#VER A 1 20170105 \"Kontantf\x94rs\x84ljning\"\n\
{\n\
   #TRANS 1910 {} 500.00\n\
   #TRANS 3010 {} -500.00\n\
}\n\
#VER B 1 20170110 \"Ink\x94p\" 20170111\n\
{\n\
   #TRANS 4010 {} 250.00\n\
   #TRANS 1910 {} -250.00\n\
   #BTRANS 1910 {} -100.00\n\
}\n";

/// A TOTALIN test file with one account and two payments, in ISO-8859-1.
pub(crate) const TOTALIN_FILE: &[u8] = b"00TI00000042  2017050512000000000001TL1TOTALIN-T                                \n\
1012345674                            SEK20170505                               \n\
201234567897                         00000000001000011111111111111111           \n\
50Anna Andersson                                                                \n\
51Storgatan 1                                                                   \n\
52123 45   Sm\xe5stad                                                              \n\
209876543217                         00000000002500011111111111111112           \n\
90000000020000000000003500020170505001                                          \n\
99000000000000009                                                               \n";

/// A giro home directory with a default config. Holds the TempDir so the directory lives as
/// long as the test.
pub(crate) struct TestEnv {
    _temp_dir: TempDir,
    config: Config,
}

impl TestEnv {
    pub(crate) fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("giro");
        let config = Config::create(&root).unwrap();
        Self {
            _temp_dir: temp_dir,
            config,
        }
    }

    pub(crate) fn config(&self) -> Config {
        self.config.clone()
    }

    /// Writes `content` into the home directory and returns its path.
    pub(crate) fn write(&self, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = self.config.root().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }
}
