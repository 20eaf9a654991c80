//! Built-in schema of the scoring application.

use oxide_ddl::model::{SchemaModel, TableSpec};

/// The tables of the scoring application, parents before children.
#[must_use]
pub fn schema() -> SchemaModel {
    SchemaModel::new(vec![
        TableSpec::new(
            "Players",
            [
                "Id INTEGER PRIMARY KEY AUTOINCREMENT",
                "Name TEXT",
                "MeetupName TEXT",
                "Symbol TEXT",
            ],
        ),
        TableSpec::new(
            "Quarters",
            [
                "Quarter TEXT PRIMARY KEY NOT NULL",
                "GameCount INTEGER NOT NULL",
                "UnusedPointsIncrement INTEGER DEFAULT 0",
            ],
        ),
        TableSpec::new(
            "Scores",
            [
                "Id INTEGER PRIMARY KEY AUTOINCREMENT",
                "GameId INTEGER",
                "PlayerId INTEGER",
                "Rank TINYINT",
                "PlayerCount TINYINT",
                "RawScore INTEGER",
                "Score REAL",
                "Date DATE",
                "Chombos INTEGER",
                "Quarter TEXT",
                "DeltaRating REAL",
                "FOREIGN KEY(PlayerId) REFERENCES Players(Id) ON DELETE CASCADE",
            ],
        ),
        TableSpec::new(
            "CurrentPlayers",
            [
                "PlayerId INTEGER PRIMARY KEY",
                "Priority TINYINT",
                "FOREIGN KEY(PlayerId) REFERENCES Players(Id) ON DELETE CASCADE",
            ],
        ),
        TableSpec::new(
            "CurrentTables",
            [
                "Id INTEGER PRIMARY KEY AUTOINCREMENT",
                "PlayerId INTEGER",
                "FOREIGN KEY(PlayerId) REFERENCES Players(Id) ON DELETE CASCADE",
            ],
        ),
        TableSpec::new(
            "Users",
            [
                "Id INTEGER PRIMARY KEY AUTOINCREMENT",
                "Email TEXT NOT NULL",
                "Password TEXT NOT NULL",
                "UNIQUE(Email)",
            ],
        ),
        TableSpec::new(
            "Admins",
            [
                "Id INTEGER PRIMARY KEY NOT NULL",
                "FOREIGN KEY(Id) REFERENCES Users(Id) ON DELETE CASCADE",
            ],
        ),
        TableSpec::new(
            "Settings",
            [
                "UserId INTEGER",
                "Setting TEXT NOT NULL",
                "Value SETTING NOT NULL",
                "FOREIGN KEY(UserId) REFERENCES Users(Id) ON DELETE CASCADE",
            ],
        ),
        TableSpec::new(
            "VerifyLinks",
            [
                "Id CHAR(32) PRIMARY KEY NOT NULL",
                "Email TEXT NOT NULL",
                "Expires DATETIME",
            ],
        ),
        TableSpec::new(
            "ResetLinks",
            [
                "Id CHAR(32) PRIMARY KEY NOT NULL",
                "User INTEGER",
                "Expires DATETIME",
                "FOREIGN KEY(User) REFERENCES Users(Id)",
            ],
        ),
        TableSpec::new(
            "Memberships",
            [
                "PlayerId INTEGER",
                "QuarterId TEXT",
                "FOREIGN KEY(PlayerId) REFERENCES Players(Id) ON DELETE CASCADE",
                "FOREIGN KEY(QuarterId) REFERENCES Quarters(Quarter) ON DELETE CASCADE",
            ],
        ),
        TableSpec::new(
            "Leaderboards",
            [
                "Period TEXT",
                "Date TEXT",
                "PlayerId INTEGER",
                "Place INTEGER",
                "AvgScore REAL",
                "GameCount INTEGER",
                "DropGames INTEGER",
                "FOREIGN KEY(PlayerId) REFERENCES Players(Id) ON DELETE CASCADE",
            ],
        ),
    ])
}
